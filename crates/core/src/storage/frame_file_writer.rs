use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use super::frame_file_name::FrameFileName;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An encoded frame on disk under its temporary name.
#[derive(Debug)]
pub struct PendingFile {
    path: PathBuf,
}

/// Where a finalized frame ended up.
#[derive(Debug)]
pub struct StoredFrame {
    pub path: PathBuf,
    /// An earlier frame already held this name and was overwritten.
    pub replaced: bool,
}

/// Persists encoded frames into one output directory.
///
/// Files are written under a temporary name first and renamed into place, so
/// a final name never refers to a partially written file.
pub struct FrameFileWriter {
    dir: PathBuf,
}

impl FrameFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the output directory (and parents) if missing.
    pub fn prepare(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn write_pending(
        &self,
        name: &FrameFileName,
        sequence: u64,
        bytes: &[u8],
    ) -> Result<PendingFile, PersistError> {
        let path = self.dir.join(name.temp_name(sequence));
        if let Err(source) = fs::write(&path, bytes) {
            // A short write may have left a partial file behind.
            let _ = fs::remove_file(&path);
            return Err(PersistError::Write { path, source });
        }
        Ok(PendingFile { path })
    }

    /// Moves a pending file to its final name. On failure the temporary file
    /// is removed so no orphan is left behind.
    pub fn finalize(
        &self,
        pending: PendingFile,
        final_name: &str,
    ) -> Result<StoredFrame, PersistError> {
        let target = self.dir.join(final_name);
        let replaced = target.exists();
        match fs::rename(&pending.path, &target) {
            Ok(()) => Ok(StoredFrame {
                path: target,
                replaced,
            }),
            Err(source) => {
                let _ = fs::remove_file(&pending.path);
                Err(PersistError::Rename {
                    from: pending.path,
                    to: target,
                    source,
                })
            }
        }
    }
}
