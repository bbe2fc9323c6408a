//! On-disk storage for uploaded files.
//!
//! Files land in a single directory under the final path component of the
//! client-supplied name. A later upload with the same name overwrites the
//! earlier file.

use anyhow::Context;
use std::path::PathBuf;

use crate::error::QaError;
use crate::multipart::UploadedFile;

pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Opens the upload directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create upload directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Resolves the on-disk path for a client filename.
    ///
    /// Directory components (either `/` or `\` separated) are dropped, so a
    /// name like `../../etc/passwd` is stored as `passwd` inside the upload
    /// directory.
    pub fn path_for(&self, filename: &str) -> Result<PathBuf, QaError> {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() || name == "." || name == ".." {
            return Err(QaError::malformed("invalid upload filename"));
        }
        Ok(self.dir.join(name))
    }

    /// Writes the file's bytes verbatim and returns where they went.
    pub async fn save(&self, file: &UploadedFile) -> Result<PathBuf, QaError> {
        let path = self.path_for(&file.filename)?;
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = file.bytes.len(), "Stored upload");
        Ok(path)
    }
}
