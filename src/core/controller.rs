use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::object::Metadata;
use crate::error::RcpError;

/// `Controller` config object. `spec.type` selects which of the
/// type-specific spec shapes `spec.spec` decodes into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ControllerSpecEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSpecEnvelope {
    #[serde(rename = "type")]
    pub controller_type: ControllerSpecType,
    pub spec: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerSpecType {
    Template,
    Wasm,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateControllerSpec {
    #[serde(default, rename = "listTemplate")]
    pub list_template: Option<String>,
    #[serde(default, rename = "resourceTemplate")]
    pub resource_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmControllerSpec {
    pub path: String,
}

/// A fully decoded `Controller` document: either a template or a wasm
/// configuration, resolved from the tagged `spec.type` field. Mirrors the
/// two-pass decode `core.DecodeController` performed in the original — the
/// envelope is decoded first so `spec.spec` can be redecoded according to
/// `spec.type`.
pub enum DecodedController {
    Template {
        name: String,
        spec: TemplateControllerSpec,
    },
    Wasm {
        name: String,
        spec: WasmControllerSpec,
    },
}

pub fn decode_controller(doc: &Controller) -> Result<DecodedController, RcpError> {
    match doc.spec.controller_type {
        ControllerSpecType::Template => {
            let spec = if doc.spec.spec.is_null() {
                TemplateControllerSpec::default()
            } else {
                serde_json::from_value(doc.spec.spec.clone())
                    .map_err(|e| RcpError::Config(format!("parsing template spec: {e}")))?
            };

            Ok(DecodedController::Template {
                name: doc.metadata.name.clone(),
                spec,
            })
        }
        ControllerSpecType::Wasm => {
            let spec: WasmControllerSpec = serde_json::from_value(doc.spec.spec.clone())
                .map_err(|e| RcpError::Config(format!("parsing wasm spec: {e}")))?;

            Ok(DecodedController::Wasm {
                name: doc.metadata.name.clone(),
                spec,
            })
        }
    }
}
