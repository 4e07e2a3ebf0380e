//! Sample directories
//!
//! A [`SampleLibrary`] is a flat directory of audio files. Lookups match a
//! query as a case-insensitive substring of the file name, which is how
//! trigger payloads and theme-song names address samples.

use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extensions accepted by sample upload
pub const UPLOAD_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "flac"];

/// One file in a sample directory
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SampleInfo {
    /// File stem
    pub name: String,
    /// Extension including the dot, e.g. ".wav"
    pub ext: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct SampleLibrary {
    dir: PathBuf,
}

impl SampleLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Regular files in the directory, sorted by file name
    pub fn list(&self) -> Result<Vec<SampleInfo>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::NotFound(format!("Sample directory {}: {}", self.dir.display(), e)))?;

        let mut samples = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let path = entry.path();
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();

            samples.push(SampleInfo {
                name,
                ext,
                path,
                size: metadata.len(),
            });
        }

        samples.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(samples)
    }

    /// First file whose name contains `query`, ignoring case
    pub fn find(&self, query: &str) -> Option<PathBuf> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        self.list().ok()?.into_iter().find_map(|sample| {
            let file_name = sample.path.file_name()?.to_string_lossy().to_lowercase();
            file_name.contains(&query).then_some(sample.path)
        })
    }

    /// First sample whose stem contains `query` (case-sensitive)
    pub fn find_by_stem(&self, query: &str) -> Option<SampleInfo> {
        self.list()
            .ok()?
            .into_iter()
            .find(|sample| sample.name.contains(query))
    }

    /// Any file from the directory
    pub fn random(&self) -> Result<PathBuf> {
        let samples = self.list()?;
        samples
            .choose(&mut rand::thread_rng())
            .map(|sample| sample.path.clone())
            .ok_or_else(|| Error::NotFound(format!("No samples in {}", self.dir.display())))
    }

    /// Store an uploaded sample under its own file name.
    ///
    /// # Errors
    /// `BadRequest` for unsafe names, unsupported extensions, oversized files
    /// and names that already exist.
    pub fn save_upload(&self, file_name: &str, data: &[u8], max_bytes: usize) -> Result<PathBuf> {
        let file_name = validate_upload_name(file_name)?;

        if data.len() > max_bytes {
            return Err(Error::BadRequest(format!(
                "Upload of {} bytes exceeds the {} byte limit",
                data.len(),
                max_bytes
            )));
        }
        if data.is_empty() {
            return Err(Error::BadRequest("Empty upload".to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file_name);

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::BadRequest(format!("Sample {} already exists", file_name)));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(data) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        info!("Stored uploaded sample {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }
}

/// Accept a bare file name with a supported audio extension
pub fn validate_upload_name(file_name: &str) -> Result<String> {
    let file_name = file_name.trim();

    if file_name.is_empty()
        || file_name.starts_with('.')
        || file_name.contains(&['/', '\\'][..])
        || file_name.contains("..")
    {
        return Err(Error::BadRequest(format!("Invalid file name '{}'", file_name)));
    }

    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        debug!("Rejected upload {} (extension '{}')", file_name, ext);
        return Err(Error::BadRequest(format!(
            "Unsupported file type '{}', expected one of {}",
            ext,
            UPLOAD_EXTENSIONS.join(", ")
        )));
    }

    Ok(file_name.to_string())
}
