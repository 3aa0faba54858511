//! Files served below a document root.
//!
//! Request paths are resolved component by component: `..` and any other component that could
//! leave the root are refused before the file system is touched. Files are handed out as
//! read-only memory mappings so their bytes go to the socket without being copied.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;
use tracing::trace;

use crate::protocol::Payload;

/// Permission bit that makes a file readable by everyone
const WORLD_READABLE: u32 = 0o004;

/// What a request path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// A world-readable regular file of `len` bytes.
    Regular { len: u64 },
    /// Nothing exists at the path.
    Missing,
    /// Something exists but it is not a regular file.
    NotRegular,
    /// A regular file without the world-readable bit.
    Unreadable,
    /// The path tries to escape the document root.
    OutsideRoot,
}

#[derive(Debug, Clone)]
pub struct StaticRoot {
    dir: PathBuf,
}

impl StaticRoot {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps a request path onto the file system, `None` if it would leave the root.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.dir.clone();
        for component in Path::new(path).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(name) => resolved.push(name),
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    pub fn stat(&self, path: &str) -> FileStatus {
        let Some(full_path) = self.resolve(path) else {
            return FileStatus::OutsideRoot;
        };

        let Ok(metadata) = fs::metadata(&full_path) else {
            return FileStatus::Missing;
        };

        if !metadata.is_file() {
            FileStatus::NotRegular
        } else if metadata.permissions().mode() & WORLD_READABLE == 0 {
            FileStatus::Unreadable
        } else {
            FileStatus::Regular { len: metadata.len() }
        }
    }

    /// Opens the file at `path` as a response body.
    ///
    /// Empty files yield an empty owned payload since a zero-length mapping is not possible.
    pub fn open(&self, path: &str) -> io::Result<Payload> {
        let full_path = self.resolve(path).ok_or_else(|| io::Error::from(io::ErrorKind::PermissionDenied))?;
        let file = File::open(&full_path)?;

        if file.metadata()?.len() == 0 {
            return Ok(Payload::OwnedBytes(Bytes::new()));
        }

        // SAFETY: the mapping is read-only and the document root is expected to hold files that
        // are not truncated while being served.
        let map = unsafe { Mmap::map(&file)? };
        trace!(path = %full_path.display(), len = map.len(), "mapped file");
        Ok(Payload::from(map))
    }
}
