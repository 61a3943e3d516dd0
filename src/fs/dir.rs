use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RcpError, RcpResult};

/// A writable filesystem rooted at a real directory on disk. Backs the
/// local `Source` and the writable side of Git `Update` worktrees.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        let full = self.resolve(path);
        fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RcpError::NotFound(format!("{path}: {e}"))
            } else {
                RcpError::Io(e)
            }
        })
    }

    pub fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        let full_pattern = self.root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();

        let mut matches = Vec::new();
        for entry in glob::glob(&full_pattern)
            .map_err(|e| RcpError::Internal(format!("invalid glob pattern {pattern:?}: {e}")))?
        {
            let entry = entry.map_err(|e| RcpError::Io(e.into_error()))?;
            if let Ok(rel) = entry.strip_prefix(&self.root) {
                matches.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }

        matches.sort();
        Ok(matches)
    }

    pub fn write(&self, path: &str, contents: &[u8]) -> RcpResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&full, contents)?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> RcpResult<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RcpError::NotFound(format!("{path}: {e}")))
            }
            Err(e) => Err(RcpError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFs::new(dir.path());

        fs.write("default/foo.json", b"{}").unwrap();
        assert_eq!(fs.read("default/foo.json").unwrap(), b"{}");
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFs::new(dir.path());

        let err = fs.read("missing.json").unwrap_err();
        assert!(matches!(err, RcpError::NotFound(_)));
    }

    #[test]
    fn glob_returns_sorted_relative_matches() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFs::new(dir.path());

        fs.write("default/a-Resource-bar.json", b"{}").unwrap();
        fs.write("default/a-Resource-foo.json", b"{}").unwrap();

        let matches = fs.glob("default/a-Resource-*.json").unwrap();
        assert_eq!(
            matches,
            vec![
                "default/a-Resource-bar.json".to_string(),
                "default/a-Resource-foo.json".to_string(),
            ]
        );
    }

    #[test]
    fn remove_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = DirFs::new(dir.path());

        let err = fs.remove("missing.json").unwrap_err();
        assert!(matches!(err, RcpError::NotFound(_)));
    }
}
