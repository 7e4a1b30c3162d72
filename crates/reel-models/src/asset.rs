//! Scoped file handles for resolved assets.

use std::path::{Path, PathBuf};

/// A file produced (or selected) for a single compile request.
///
/// `owning_dir` is the request scratch directory the file lives in, or
/// `None` for shared read-only files such as catalogue clips. Handles never
/// delete anything themselves; the directory owner does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    path: PathBuf,
    basename: String,
    owning_dir: Option<PathBuf>,
}

impl AssetHandle {
    /// Handle for a file inside a request-owned directory.
    pub fn owned(path: impl Into<PathBuf>, owning_dir: impl Into<PathBuf>) -> Self {
        Self::new(path.into(), Some(owning_dir.into()))
    }

    /// Handle for a shared file the request must not remove.
    pub fn shared(path: impl Into<PathBuf>) -> Self {
        Self::new(path.into(), None)
    }

    fn new(path: PathBuf, owning_dir: Option<PathBuf>) -> Self {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            basename,
            owning_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn owning_dir(&self) -> Option<&Path> {
        self.owning_dir.as_deref()
    }

    /// True when the handle lives under its owning directory.
    pub fn is_scoped(&self) -> bool {
        self.owning_dir
            .as_deref()
            .is_some_and(|dir| self.path.starts_with(dir))
    }
}
