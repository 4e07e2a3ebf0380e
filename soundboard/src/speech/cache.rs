//! Content-addressed speech cache
//!
//! One canonical WAV per `(text, voice, method)`, stored as
//! `<cache_dir>/<sha256 hex>.wav`. Entries are written to a temporary file
//! in the same directory and renamed into place, so a reader never sees a
//! partial file. Two writers of the same key race harmlessly: last one wins.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SpeechCache {
    dir: PathBuf,
}

impl SpeechCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lowercase hex SHA-256 of `"{text}_{name}_{method}"`
    pub fn key(text: &str, name: &str, method: &str) -> String {
        let digest = Sha256::digest(format!("{}_{}_{}", text, name, method).as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.wav", key))
    }

    /// Path of an existing entry
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Store WAV bytes under `key`, replacing any previous entry
    pub fn store(&self, key: &str, wav: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()));

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(wav)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &final_path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        debug!("Cached speech as {}", final_path.display());
        Ok(final_path)
    }
}
