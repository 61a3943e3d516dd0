//! A GitHub SCM adapter built on `octocrab`, the same client the teacher
//! repository already uses for its GitHub integration (`crab_ext.rs`).
//! Grounded on `pkg/source/git/scm/github/scm.go`.

use async_trait::async_trait;
use octocrab::Octocrab;
use ulid::Ulid;

use super::{branch_name, Proposal, ProposeRequest, Scm};
use crate::error::{RcpError, RcpResult};

pub struct GitHubScm {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubScm {
    pub fn new(client: Octocrab, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

#[async_trait]
impl Scm for GitHubScm {
    async fn propose(&self, req: ProposeRequest) -> RcpResult<Proposal> {
        let pr = self
            .client
            .pulls(&self.owner, &self.repo)
            .create(req.title, req.head, req.base)
            .body(req.body)
            .send()
            .await?;

        let url = pr
            .html_url
            .map(|u| u.to_string())
            .ok_or_else(|| RcpError::Scm("github: created pull request has no URL".into()))?;

        Ok(Proposal {
            source: "github".to_string(),
            url,
        })
    }

    async fn merge(&self, id: Ulid) -> RcpResult<()> {
        let head = format!("{}:{}", self.owner, branch_name(id));

        let prs = self
            .client
            .pulls(&self.owner, &self.repo)
            .list()
            .head(head)
            .send()
            .await?;

        let pr = prs
            .items
            .into_iter()
            .next()
            .ok_or_else(|| RcpError::NotFound(format!("proposal {id} not found")))?;

        let result = self
            .client
            .pulls(&self.owner, &self.repo)
            .merge(pr.number)
            .send()
            .await?;

        if !result.merged {
            return Err(RcpError::Scm(format!(
                "proposal {id} could not be merged: {}",
                result.message.unwrap_or_default()
            )));
        }

        Ok(())
    }
}
