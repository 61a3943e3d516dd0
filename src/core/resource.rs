use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::object::NamespacedMetadata;
use crate::error::RcpError;

/// `Resource` is the wire representation of one stored object. `spec` is
/// opaque — validated against the per-version schema on write, returned
/// verbatim on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: NamespacedMetadata,
    pub spec: Value,
}

impl Resource {
    pub fn validate(&self) -> Result<(), RcpError> {
        self.metadata.validate()
    }

    /// True if every `(k, v)` pair in `labels` matches this resource's
    /// `metadata.labels`. AND semantics across pairs, matching the label
    /// selector rule in the controller contract.
    pub fn matches_labels(&self, labels: &[(String, String)]) -> bool {
        labels
            .iter()
            .all(|(k, v)| self.metadata.labels.get(k).is_some_and(|got| got == v))
    }
}

/// `ResourceDefinition` describes a kind: its names and its per-version
/// JSON Schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: super::object::Metadata,
    pub names: Names,
    pub spec: ResourceDefinitionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Names {
    pub kind: String,
    pub singular: String,
    pub plural: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinitionSpec {
    pub group: String,
    #[serde(default)]
    pub versions: BTreeMap<String, Value>,
}
