//! Paths relative to the backing root.
//!
//! Every object the filesystem exposes is addressed by an [`InodePath`]:
//! an absolute-looking path (`/`, `/docs`, `/docs/a.txt`) interpreted
//! relative to the backing directory. Paths are built only by joining
//! validated single-segment names, so they never contain `.` or `..`
//! components and two spellings of the same object cannot coexist in the
//! inode table.

use crate::error::{FsError, FsResult};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A normalized path relative to the backing root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodePath(PathBuf);

impl InodePath {
    /// The root of the backing tree (`/`).
    pub fn root() -> Self {
        Self(PathBuf::from("/"))
    }

    /// Returns true if this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.as_os_str() == "/"
    }

    /// Returns the underlying path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    /// Returns the final component, or `None` for the root.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    /// Resolves a directory entry name against this path.
    ///
    /// `name` must be a single path segment. `.` resolves to this path and
    /// `..` to the parent (the root is its own parent). Empty names and names
    /// containing a separator are rejected with [`FsError::InvalidName`].
    pub fn child(&self, name: &OsStr) -> FsResult<Self> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == name => {
                Ok(Self(self.0.join(segment)))
            }
            (Some(Component::CurDir), None) => Ok(self.clone()),
            (Some(Component::ParentDir), None) => {
                Ok(self.parent().unwrap_or_else(Self::root))
            }
            _ => Err(FsError::InvalidName(name.to_os_string())),
        }
    }

    /// Maps this path onto an absolute location under `root`.
    pub fn to_backing(&self, root: &Path) -> PathBuf {
        match self.0.strip_prefix("/") {
            Ok(relative) if !relative.as_os_str().is_empty() => root.join(relative),
            _ => root.to_path_buf(),
        }
    }
}

impl Default for InodePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for InodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}
