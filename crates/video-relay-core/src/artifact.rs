//! Downloaded media files and their cleanup.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

/// A media file produced by an extractor.
///
/// The artifact owns its file: [`Artifact::discard`] removes it, and dropping
/// an artifact that was never discarded removes it as well.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    armed: bool,
}

impl Artifact {
    /// Take ownership of the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Location of the file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the upload file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file metadata cannot be read.
    pub async fn size(&self) -> io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Returns `true` if the file is strictly larger than `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file metadata cannot be read.
    pub async fn exceeds(&self, max_bytes: u64) -> io::Result<bool> {
        Ok(self.size().await? > max_bytes)
    }

    /// Remove the file if it still exists. Returns `true` if a file was removed.
    pub fn discard(mut self) -> bool {
        self.armed = false;
        remove_logged(&self.path)
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.armed {
            remove_logged(&self.path);
        }
    }
}

fn remove_logged(path: &Path) -> bool {
    match remove_if_exists(path) {
        Ok(removed) => {
            if removed {
                debug!(path = %path.display(), "Removed artifact");
            }
            removed
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            false
        }
    }
}

/// Delete `path` if it exists. Returns `true` if a file was removed.
///
/// # Errors
///
/// Returns an I/O error for any failure other than the file being absent.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Last stem handed out by [`artifact_stem`].
static LAST_STEM: AtomicI64 = AtomicI64::new(0);

/// File stem for a new artifact: the current Unix time in milliseconds.
///
/// Stems are unique within the process. A call landing in the same
/// millisecond as the previous one gets the next free millisecond.
#[must_use]
pub fn artifact_stem() -> String {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_STEM
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1).to_string()
}

/// Remove every `<stem>.*` entry in `dir`, such as partial downloads or
/// unmerged streams. Returns how many files were removed.
pub async fn remove_stem_files(dir: &Path, stem: &str) -> usize {
    let prefix = format!("{stem}.");
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Cannot scan download directory");
            }
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Download directory scan interrupted");
                break;
            }
        };
        let matches = entry.file_name().to_string_lossy().starts_with(&prefix);
        if matches && remove_logged(&entry.path()) {
            removed += 1;
        }
    }
    removed
}
