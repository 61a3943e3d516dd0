//! Source abstraction: read (`View`) and write (`Update`) transactions over
//! a target filesystem. Two implementations: `local` (a host directory) and
//! `git` (a remote repository, proposing changes through an SCM adapter).

pub mod git;
pub mod local;
pub mod scm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::RcpResult;
use crate::fs::{FsConfig, ReadonlyFs};

/// The outcome of an `Update` transaction. `proposal` is present only for
/// sources that open a pull/merge request (the Git source); the local
/// source always returns the zero ULID and no proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResult {
    pub id: Ulid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<scm::Proposal>,
}

impl TransactionResult {
    pub fn without_proposal() -> Self {
        Self {
            id: Ulid::nil(),
            proposal: None,
        }
    }
}

/// A read/write abstraction over a source filesystem, realized over Git and
/// over a local directory. `View` and `Update` are the only two ways the
/// router ever touches a `Source`; both isolate the filesystem mutations
/// performed by the controller invoked from inside the closure.
#[async_trait]
pub trait Source: Send + Sync {
    /// Invokes `f` with a read-only view of the filesystem at `revision`.
    async fn view(
        &self,
        revision: &str,
        f: Box<dyn FnOnce(&dyn ReadonlyFs) -> RcpResult<()> + Send>,
    ) -> RcpResult<()>;

    /// Invokes `f` with a writable `FsConfig`. Any writes performed during
    /// the call are persisted (committed, and for Git, pushed and proposed)
    /// once `f` returns successfully.
    async fn update(
        &self,
        revision: &str,
        message: &str,
        f: Box<dyn FnOnce(&FsConfig) -> RcpResult<()> + Send>,
    ) -> RcpResult<TransactionResult>;
}
