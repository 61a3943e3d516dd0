//! Filesystem abstraction used by controllers. A read-only view supports
//! directory iteration and file reads for `Get`/`List`; a writable
//! configuration additionally supports create/truncate and remove for
//! `Put`/`Delete`. The WASM controller further requires the writable side
//! to resolve to a real directory on disk, since the sandbox mounts a host
//! directory — see [`FsConfig::host_dir`].

mod dir;
mod mem;

pub use dir::DirFs;
pub use mem::MemFs;

use std::path::PathBuf;

use crate::error::RcpResult;

/// A read-only view over a tree of files, used for `Get` and `List`.
pub trait ReadonlyFs: Send + Sync {
    /// Reads the full contents of `path`, or `RcpError::NotFound` if absent.
    fn read(&self, path: &str) -> RcpResult<Vec<u8>>;

    /// Returns every path in the tree matching the glob `pattern`.
    fn glob(&self, pattern: &str) -> RcpResult<Vec<String>>;

    /// The host directory backing this view, if any. The WASM controller
    /// requires a real directory to mount into its sandbox; in-memory views
    /// (used by the Git source and by tests) return `None` and the WASM
    /// controller rejects them.
    fn host_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// A writable filesystem handle passed to `Put`/`Delete`. Either a
/// real directory on disk, or an in-memory tree usable in tests and by the
/// local/in-memory sources.
pub enum FsConfig {
    Dir(DirFs),
    Mem(MemFs),
}

impl FsConfig {
    pub fn from_host_dir(dir: impl Into<PathBuf>) -> Self {
        FsConfig::Dir(DirFs::new(dir))
    }

    pub fn from_mem(fs: MemFs) -> Self {
        FsConfig::Mem(fs)
    }

    /// The host directory backing this config, if it is backed by a real
    /// directory. The WASM controller requires this — an in-memory
    /// `FsConfig` cannot be mounted into the sandbox.
    pub fn host_dir(&self) -> Option<PathBuf> {
        match self {
            FsConfig::Dir(d) => Some(d.root().to_path_buf()),
            FsConfig::Mem(_) => None,
        }
    }

    pub fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        match self {
            FsConfig::Dir(d) => d.read(path),
            FsConfig::Mem(m) => m.read(path),
        }
    }

    pub fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        match self {
            FsConfig::Dir(d) => d.glob(pattern),
            FsConfig::Mem(m) => m.glob(pattern),
        }
    }

    pub fn write(&self, path: &str, contents: &[u8]) -> RcpResult<()> {
        match self {
            FsConfig::Dir(d) => d.write(path, contents),
            FsConfig::Mem(m) => m.write(path, contents),
        }
    }

    pub fn remove(&self, path: &str) -> RcpResult<()> {
        match self {
            FsConfig::Dir(d) => d.remove(path),
            FsConfig::Mem(m) => m.remove(path),
        }
    }
}

impl ReadonlyFs for FsConfig {
    fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        FsConfig::read(self, path)
    }

    fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        FsConfig::glob(self, pattern)
    }

    fn host_dir(&self) -> Option<PathBuf> {
        FsConfig::host_dir(self)
    }
}

impl ReadonlyFs for DirFs {
    fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        DirFs::read(self, path)
    }

    fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        DirFs::glob(self, pattern)
    }

    fn host_dir(&self) -> Option<PathBuf> {
        Some(self.root().to_path_buf())
    }
}

impl ReadonlyFs for MemFs {
    fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        MemFs::read(self, path)
    }

    fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        MemFs::glob(self, pattern)
    }
}
