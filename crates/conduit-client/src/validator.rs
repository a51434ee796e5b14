//! Client-side mirror of a tool's `outputSchema` validation (spec.md §4.6
//! step 6): the server already validated `structuredContent` before
//! replying, but a well-behaved client re-checks it against the schema it
//! cached from `tools/list`, so a buggy or compromised server can't hand the
//! application malformed structured data silently. Mirrors
//! `conduit-server::validator::JsonSchemaValidator`'s cache-by-schema-text
//! design.

use crate::error::{ClientError, ClientResult};
use conduit_protocol::ToolDescriptor;
use dashmap::DashMap;
use std::sync::Arc;

/// Caches each known tool's `outputSchema` (if it declared one) plus the
/// compiled `jsonschema::Validator` for it, refreshed whenever `tools/list`
/// is re-fetched.
#[derive(Debug, Default)]
pub struct OutputSchemaCache {
    schemas: DashMap<String, Option<serde_json::Value>>,
    compiled: DashMap<String, Arc<jsonschema::Validator>>,
}

impl OutputSchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached schemas with the tool descriptors from a fresh
    /// `tools/list`, dropping any tool no longer advertised.
    pub fn refresh(&self, tools: &[ToolDescriptor]) {
        self.schemas.clear();
        self.compiled.clear();
        for tool in tools {
            self.schemas.insert(tool.name.clone(), tool.output_schema.clone());
        }
    }

    /// Validates a `tools/call` result against `tool_name`'s cached
    /// `outputSchema`. A tool with no declared output schema, or a tool this
    /// cache has never seen, is accepted without validation — the spec only
    /// requires the check when the client has something to check against.
    /// A tool that *does* declare an `outputSchema` but whose successful
    /// (`!is_error`) result carries no `structured_content` at all is
    /// rejected outright (spec.md §4.6 testable property: "rejects a
    /// response whose `structuredContent` is missing without `isError`").
    pub fn validate(
        &self,
        tool_name: &str,
        structured_content: Option<&serde_json::Value>,
        is_error: bool,
    ) -> ClientResult<()> {
        let Some(entry) = self.schemas.get(tool_name) else { return Ok(()) };
        let Some(schema) = entry.value().clone() else { return Ok(()) };
        let Some(structured_content) = structured_content else {
            return if is_error {
                Ok(())
            } else {
                Err(ClientError::OutputValidationFailed(format!(
                    "tool '{tool_name}' declares an outputSchema but the response carries no structuredContent"
                )))
            };
        };
        let compiled = self.compiled(tool_name, &schema)?;
        let errors: Vec<String> = compiled.iter_errors(structured_content).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::OutputValidationFailed(errors.join("; ")))
        }
    }

    fn compiled(&self, tool_name: &str, schema: &serde_json::Value) -> ClientResult<Arc<jsonschema::Validator>> {
        if let Some(existing) = self.compiled.get(tool_name) {
            return Ok(Arc::clone(&existing));
        }
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| ClientError::OutputValidationFailed(format!("invalid cached schema: {e}")))?;
        let validator = Arc::new(validator);
        self.compiled.insert(tool_name.to_string(), Arc::clone(&validator));
        Ok(validator)
    }
}
