//! Per-request scratch directories.

use std::path::Path;

use tempfile::{Builder, TempDir};
use tracing::{debug, warn};

/// Scratch directory owned by one request; removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create `reel-<request_id>-XXXX` under `root`, or the OS temp dir.
    pub fn create(root: Option<&Path>, request_id: &str) -> std::io::Result<Self> {
        let prefix = format!("reel-{}-", request_id);
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Created scratch dir {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, logging instead of failing.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed scratch dir {}", path.display()),
            Err(e) => warn!("Failed to remove scratch dir {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path()), "abc").unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("reel-abc-"));
        std::fs::write(path.join("narration.mp3"), b"mp3").unwrap();

        scratch.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(Some(root.path()), "drop").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let scratch = ScratchDir::create(Some(&nested), "nested").unwrap();
        assert!(scratch.path().starts_with(&nested));
    }
}
