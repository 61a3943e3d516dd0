//! Per-`(definition, version)` JSON Schema compilation. Grounded on
//! `pkg/api/schema.go`: each schema is compiled once, at registry
//! construction, and reused for every subsequent write.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::{RcpError, RcpResult};

/// A compiled schema bound to one `(group, version)` pair. Validates only
/// the decoded `spec` field of a `Resource`, never the envelope.
pub struct CompiledSchema {
    validator: JSONSchema,
}

impl CompiledSchema {
    pub fn compile(schema: &Value) -> RcpResult<Self> {
        let validator = JSONSchema::compile(schema)
            .map_err(|e| RcpError::Config(format!("compiling schema: {e}")))?;

        Ok(Self { validator })
    }

    /// Validates `spec`, returning every violation verbatim. An empty
    /// result means the spec is valid.
    pub fn validate(&self, spec: &Value) -> Vec<String> {
        match self.validator.validate(spec) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_spec_missing_required_field() {
        let schema = json!({
            "type": "object",
            "required": ["foo"],
            "properties": { "foo": { "type": "string" } },
        });

        let compiled = CompiledSchema::compile(&schema).unwrap();
        let errors = compiled.validate(&json!({"foo": 42}));
        assert!(!errors.is_empty());
    }

    #[test]
    fn accepts_valid_spec() {
        let schema = json!({
            "type": "object",
            "required": ["foo"],
            "properties": { "foo": { "type": "string" } },
        });

        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert!(compiled.validate(&json!({"foo": "bar"})).is_empty());
    }
}
