use serde::{Deserialize, Serialize};

use super::object::Metadata;

/// `Binding` links a set of resource definitions to a single controller
/// instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: BindingSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingSpec {
    pub resources: Vec<String>,
    pub controller: String,
}
