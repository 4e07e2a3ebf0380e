//! # Soundboard Common Library
//!
//! Shared code for the soundboard service:
//! - Configuration loading and file resolution
//! - Common error type

pub mod config;
pub mod error;

pub use config::SoundboardConfig;
pub use error::{Error, Result};
