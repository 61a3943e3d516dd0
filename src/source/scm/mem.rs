//! An in-memory `Scm` used in tests (grounded on
//! `pkg/source/git/scm/mem/scm.go`): stores proposals in a map instead of
//! talking to a real provider.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ulid::Ulid;

use super::{Proposal, ProposeRequest, Scm};
use crate::error::{RcpError, RcpResult};

#[derive(Default)]
pub struct MemScm {
    proposals: Mutex<BTreeMap<Ulid, ProposeRequest>>,
}

impl MemScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.lock().expect("MemScm lock poisoned").len()
    }
}

#[async_trait]
impl Scm for MemScm {
    async fn propose(&self, req: ProposeRequest) -> RcpResult<Proposal> {
        let id = branch_id(&req.head)
            .ok_or_else(|| RcpError::Scm(format!("unexpected head ref: {}", req.head)))?;

        let url = format!("mem://proposals/{id}");
        self.proposals
            .lock()
            .expect("MemScm lock poisoned")
            .insert(id, req);

        Ok(Proposal {
            source: "mem".to_string(),
            url,
        })
    }

    async fn merge(&self, id: Ulid) -> RcpResult<()> {
        self.proposals
            .lock()
            .expect("MemScm lock poisoned")
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RcpError::NotFound(format!("proposal {id} not found")))
    }
}

fn branch_id(head: &str) -> Option<Ulid> {
    head.strip_prefix("cup/proposal/")
        .and_then(|id| Ulid::from_string(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn propose_then_merge() {
        let scm = MemScm::new();
        let id = Ulid::new();

        let proposal = scm
            .propose(ProposeRequest {
                head: super::super::branch_name(id),
                base: "main".into(),
                title: "feat: update".into(),
                body: "feat: update".into(),
            })
            .await
            .unwrap();

        assert_eq!(proposal.source, "mem");
        assert_eq!(scm.proposal_count(), 1);

        scm.merge(id).await.unwrap();
        assert_eq!(scm.proposal_count(), 0);
    }
}
