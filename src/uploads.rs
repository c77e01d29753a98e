use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Scratch directory for uploaded query images.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

/// An uploaded file that is deleted when the guard goes out of scope.
#[derive(Debug)]
pub struct UploadGuard {
    path: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    /// Remove every regular file left over in the upload directory.
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("listing {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Write `bytes` to a fresh uniquely named file.
    pub fn save(&self, bytes: &[u8]) -> Result<UploadGuard> {
        let path = self
            .root
            .join(format!("{}.jpg", uuid::Uuid::new_v4().simple()));
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(UploadGuard { path })
    }
}

impl UploadGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to remove upload {}: {}", self.path.display(), e);
        }
    }
}
