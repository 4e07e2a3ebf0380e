//! # Soundboard Library
//!
//! Playback coordination core for a home-automation soundboard.
//!
//! **Purpose:** Accept triggers (bus messages, HTTP calls), render samples,
//! speech and tones, and play them one at a time on the local audio device
//! while ducking background music on an MPD server.
//!
//! **Architecture:** two blocking consumer threads (samples, tones) share one
//! exclusive playback lock around a cpal sink; speech synthesis and the HTTP
//! surface run on tokio.

pub mod api;
pub mod audio;
pub mod ducking;
pub mod error;
pub mod ingress;
pub mod playback;
pub mod samples;
pub mod soundboard;
pub mod speech;
pub mod tones;

pub use error::{Error, Result};
pub use soundboard::Soundboard;
