use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RcpError;

/// A cluster-scoped configuration object: `ResourceDefinition`,
/// `Controller` and `Binding` documents are all shaped this way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object<T> {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: T,
}

/// Metadata for a cluster-scoped configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl<T> Object<T> {
    pub fn validate(&self) -> Result<(), RcpError> {
        if self.api_version != super::API_VERSION {
            return Err(RcpError::Validation(format!(
                "unexpected apiVersion: {:?}",
                self.api_version
            )));
        }

        if self.metadata.name.is_empty() {
            return Err(RcpError::Validation("name cannot be empty".into()));
        }

        Ok(())
    }
}

/// Metadata for a namespace-scoped `Resource`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespacedMetadata {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl NamespacedMetadata {
    pub fn validate(&self) -> Result<(), RcpError> {
        if self.namespace.is_empty() {
            return Err(RcpError::Validation("namespace cannot be empty".into()));
        }

        if self.name.is_empty() {
            return Err(RcpError::Validation("name cannot be empty".into()));
        }

        Ok(())
    }
}
