//! Temporary on-disk audio artifacts handed from producers to the playback consumer.

use crate::error::{CableVoiceError, CableVoiceResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Delete `path`, treating an already missing file as success
///
/// # Errors
///
/// Returns a file error for any failure other than the file being gone
pub fn remove_artifact(path: &Path) -> CableVoiceResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CableVoiceError::file(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}

/// An encoded audio file owned by exactly one pipeline stage at a time.
///
/// The file is removed by [`TempArtifact::cleanup`] or, failing that, when the
/// artifact is dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    removed: bool,
}

impl TempArtifact {
    /// Write `bytes` to a fresh, uniquely named file in `dir`
    ///
    /// # Errors
    ///
    /// Returns a file error if the directory or file cannot be written
    pub fn create(dir: &Path, extension: &str, bytes: &[u8]) -> CableVoiceResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            CableVoiceError::file(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let path = dir.join(format!("cablevoice-{}.{extension}", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).map_err(|e| {
            CableVoiceError::file(format!("Failed to write {}: {e}", path.display()))
        })?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file; calling again after success does nothing
    ///
    /// # Errors
    ///
    /// Returns a file error if the file exists but cannot be removed
    pub fn cleanup(&mut self) -> CableVoiceResult<()> {
        if self.removed {
            return Ok(());
        }
        remove_artifact(&self.path)?;
        self.removed = true;
        Ok(())
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("{}", e);
        }
    }
}
