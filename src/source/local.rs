//! The local `Source`: reads and writes directly against a host directory.
//! No proposal is ever created — `Update` returns the zero ULID, matching
//! `pkg/source/local/source.go`.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Source, TransactionResult};
use crate::error::RcpResult;
use crate::fs::{DirFs, FsConfig, ReadonlyFs};

pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Source for LocalSource {
    async fn view(
        &self,
        _revision: &str,
        f: Box<dyn FnOnce(&dyn ReadonlyFs) -> RcpResult<()> + Send>,
    ) -> RcpResult<()> {
        let fs = DirFs::new(&self.path);
        f(&fs)
    }

    async fn update(
        &self,
        _revision: &str,
        _message: &str,
        f: Box<dyn FnOnce(&FsConfig) -> RcpResult<()> + Send>,
    ) -> RcpResult<TransactionResult> {
        let fs_config = FsConfig::from_host_dir(&self.path);
        f(&fs_config)?;
        Ok(TransactionResult::without_proposal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NamespacedMetadata, Resource};
    use crate::encoding;
    use serde_json::json;

    #[tokio::test]
    async fn view_sees_writes_made_by_update() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path());

        let resource = Resource {
            api_version: "test.cup.flipt.io/v1alpha1".into(),
            kind: "Resource".into(),
            metadata: NamespacedMetadata {
                namespace: "default".into(),
                name: "foo".into(),
                labels: Default::default(),
                annotations: Default::default(),
            },
            spec: json!({}),
        };

        let result = source
            .update(
                "main",
                "feat: update",
                Box::new(move |fs| {
                    let bytes = encoding::encode_indented(&resource)?;
                    fs.write("default/foo.json", &bytes)
                }),
            )
            .await
            .unwrap();

        assert_eq!(result.id, ulid::Ulid::nil());
        assert!(result.proposal.is_none());

        source
            .view(
                "main",
                Box::new(|fs| {
                    let bytes = fs.read("default/foo.json")?;
                    assert!(!bytes.is_empty());
                    Ok(())
                }),
            )
            .await
            .unwrap();
    }
}
