use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use feed_logging::{feed_debug, feed_info, feed_warn};
use tempfile::NamedTempFile;
use tgfeed_core::FeedDocument;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("output path {0:?} does not name a file")]
    InvalidPath(PathBuf),
    #[error("failed to serialize feed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file in the
/// same directory and renaming it over the target.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = new_temp_file(&self.dir)?;
        // The replacement keeps the mode of the file it replaces.
        if let Ok(existing) = fs::metadata(&target) {
            tmp.as_file().set_permissions(existing.permissions())?;
        }
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // The rename replaces any existing file in one step, so readers see
        // either the old document or the new one.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Temp file created with the mode of a plain `File::create`, umask applied.
#[cfg(unix)]
fn new_temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;

    tempfile::Builder::new()
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn new_temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    NamedTempFile::new_in(dir)
}

/// Writes the feed as pretty JSON to `path`, replacing the previous file atomically.
pub fn write_feed_document(path: &Path, document: &FeedDocument) -> Result<PathBuf, PersistError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let content = document.to_pretty_json()?;
    let written = AtomicFileWriter::new(dir).write(filename, &content)?;
    feed_debug!("Wrote {} bytes to {:?}", content.len(), written);
    Ok(written)
}

/// Reads the feed written by a previous run.
///
/// A missing file is the normal first-run case. An unreadable or corrupt file
/// is reported and treated as absent so a broken artifact cannot block the
/// next run; it will be overwritten.
pub fn load_feed_document(path: &Path) -> Option<FeedDocument> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            feed_info!("No previous feed at {:?}; starting fresh", path);
            return None;
        }
        Err(err) => {
            feed_warn!("Failed to read previous feed from {:?}: {}", path, err);
            return None;
        }
    };

    match FeedDocument::from_json(&content) {
        Ok(document) => {
            feed_info!(
                "Loaded previous feed from {:?} ({} posts)",
                path,
                document.posts.len()
            );
            Some(document)
        }
        Err(err) => {
            feed_warn!("Failed to parse previous feed from {:?}: {}", path, err);
            None
        }
    }
}
