use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{RcpError, RcpResult};

/// An in-memory filesystem, keyed by `/`-separated path. Used by the git
/// source's in-memory view (constructed from a resolved tree) and by tests
/// that exercise the template controller without touching disk.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        Self {
            files: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    pub fn read(&self, path: &str) -> RcpResult<Vec<u8>> {
        let files = self.files.read().expect("MemFs lock poisoned");
        files
            .get(path)
            .cloned()
            .ok_or_else(|| RcpError::NotFound(path.to_string()))
    }

    pub fn glob(&self, pattern: &str) -> RcpResult<Vec<String>> {
        let compiled = glob::Pattern::new(pattern)
            .map_err(|e| RcpError::Internal(format!("invalid glob pattern {pattern:?}: {e}")))?;

        let files = self.files.read().expect("MemFs lock poisoned");
        let mut matches: Vec<String> = files
            .keys()
            .filter(|path| compiled.matches(path))
            .cloned()
            .collect();

        matches.sort();
        Ok(matches)
    }

    pub fn write(&self, path: &str, contents: &[u8]) -> RcpResult<()> {
        let mut files = self.files.write().expect("MemFs lock poisoned");
        files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    pub fn remove(&self, path: &str) -> RcpResult<()> {
        let mut files = self.files.write().expect("MemFs lock poisoned");
        files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RcpError::NotFound(path.to_string()))
    }
}
