//! Staging files for uploads
//!
//! Each upload is written to a uniquely named file before it is handed to the
//! object store, so two concurrent uploads of `report.pdf` never share a
//! staging path.
//!
//! # Flow
//!
//! 1. Write the buffered body to `<staging_dir>/cloudshelf-<uuid>.upload`
//! 2. Compute its SHA-256 digest
//! 3. Read it back for the store write, checking size and digest
//! 4. Remove the file on drop, whatever happened in between
//!
//! ```no_run
//! use cloudshelf::upload::StagedUpload;
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let staged = StagedUpload::write(&std::env::temp_dir(), Bytes::from("Hello")).await?;
//! println!("{} ({} bytes, sha256 {})", staged.path().display(), staged.size(), staged.content_hash());
//! let bytes = staged.read().await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// A staged upload on local disk
///
/// Removed when dropped (RAII).
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    size: u64,
    content_hash: String,
}

impl StagedUpload {
    /// Write `data` to a fresh staging file under `dir`
    pub async fn write(dir: &Path, data: Bytes) -> io::Result<Self> {
        let path = dir.join(format!("cloudshelf-{}.upload", uuid::Uuid::new_v4()));

        // Construct the guard first so a failed write still cleans up.
        let staged = Self {
            path,
            size: data.len() as u64,
            content_hash: Self::compute_sha256(&data),
        };

        tokio::fs::write(&staged.path, &data).await?;
        Ok(staged)
    }

    /// Read the staged bytes back
    ///
    /// Fails with `UnexpectedEof` if the file was truncated and with
    /// `InvalidData` if its content no longer matches the recorded digest.
    pub async fn read(&self) -> io::Result<Bytes> {
        let data = tokio::fs::read(&self.path).await?;
        if data.len() as u64 != self.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "staging file {} holds {} bytes, expected {}",
                    self.path.display(),
                    data.len(),
                    self.size
                ),
            ));
        }

        let actual = Self::compute_sha256(&data);
        if actual != self.content_hash {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "staging file {} changed on disk: sha256 {}, expected {}",
                    self.path.display(),
                    actual,
                    self.content_hash
                ),
            ));
        }

        Ok(Bytes::from(data))
    }

    /// Get the path to the staging file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the size of the file in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA-256 of the content (hex encoded)
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

/// Resolve the configured staging directory, falling back to the system temp dir
pub fn staging_dir(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir)
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up staging file"
                );
            }
        }
    }
}
