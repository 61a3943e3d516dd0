//! The SCM adapter contract: a provider-agnostic surface the Git source
//! uses to open pull/merge requests for pushed proposal branches. Grounded
//! on `pkg/source/git/scm/{github,mem}/scm.go`.

pub mod github;
pub mod mem;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::RcpResult;

/// A request to open a pull/merge request for a pushed branch.
#[derive(Debug, Clone)]
pub struct ProposeRequest {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// The result of a successful `Propose` call: which platform accepted it,
/// and a URL a human can follow to review it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub source: String,
    pub url: String,
}

#[async_trait]
pub trait Scm: Send + Sync {
    /// Opens a pull/merge request for `req.head` against `req.base`.
    async fn propose(&self, req: ProposeRequest) -> RcpResult<Proposal>;

    /// Merges the proposal previously opened for `id`, identified by the
    /// `cup/proposal/<id>` branch naming convention. Used by tests.
    async fn merge(&self, id: Ulid) -> RcpResult<()>;
}

/// The `cup/proposal/<id>` branch naming convention proposals are matched
/// against.
pub fn branch_name(id: Ulid) -> String {
    format!("cup/proposal/{id}")
}
