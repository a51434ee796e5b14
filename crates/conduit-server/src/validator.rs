//! Pluggable JSON Schema validation for registry input/output payloads
//! (spec.md §4.6 step 2 and the client-side `outputSchema` mirror).
//!
//! [`SchemaValidator`] is the abstract interface the spec names; registries
//! hold a `dyn SchemaValidator` rather than depending on `jsonschema`
//! directly, so an embedder can swap in another validation backend.

use crate::error::{ServerError, ServerResult};
use dashmap::DashMap;
use std::sync::Arc;

pub trait SchemaValidator: Send + Sync + std::fmt::Debug {
    /// Validates `instance` against `schema`, collecting every violation
    /// into one [`ServerError::ValidationFailed`] rather than stopping at
    /// the first.
    fn validate(&self, schema: &serde_json::Value, instance: &serde_json::Value) -> ServerResult<()>;
}

/// The default [`SchemaValidator`], backed by the `jsonschema` crate.
/// Compiled validators are cached by the schema's canonical JSON text since
/// registry schemas are fixed at registration time and re-validated on
/// every call.
#[derive(Debug, Default)]
pub struct JsonSchemaValidator {
    cache: DashMap<String, Arc<jsonschema::Validator>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled(&self, schema: &serde_json::Value) -> ServerResult<Arc<jsonschema::Validator>> {
        let key = schema.to_string();
        if let Some(existing) = self.cache.get(&key) {
            return Ok(Arc::clone(&existing));
        }
        let compiled = jsonschema::validator_for(schema)
            .map_err(|e| ServerError::ValidationFailed(format!("invalid schema: {e}")))?;
        let compiled = Arc::new(compiled);
        self.cache.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &serde_json::Value, instance: &serde_json::Value) -> ServerResult<()> {
        let validator = self.compiled(schema)?;
        let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServerError::ValidationFailed(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}},
            "required": ["a"],
        })
    }

    #[test]
    fn accepts_a_conforming_instance() {
        let v = JsonSchemaValidator::new();
        assert!(v.validate(&schema(), &serde_json::json!({"a": 1})).is_ok());
    }

    #[test]
    fn rejects_a_missing_required_property() {
        let v = JsonSchemaValidator::new();
        assert!(v.validate(&schema(), &serde_json::json!({})).is_err());
    }

    #[test]
    fn reuses_the_cached_compiled_validator() {
        let v = JsonSchemaValidator::new();
        v.validate(&schema(), &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(v.cache.len(), 1);
        v.validate(&schema(), &serde_json::json!({"a": 2})).unwrap();
        assert_eq!(v.cache.len(), 1);
    }
}
