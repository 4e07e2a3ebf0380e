//! Playback coordination: request types, FIFO queues and the exclusive
//! playback core shared by all consumer threads

pub mod coordinator;
pub mod queue;
pub mod request;

pub use coordinator::{Coordinator, PlaybackCore};
pub use queue::PlaybackQueue;
pub use request::{AudioSource, PlaybackRequest};
