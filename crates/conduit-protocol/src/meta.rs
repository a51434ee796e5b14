use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The related-task `_meta` key, namespaced per the MCP extension convention.
pub const RELATED_TASK_KEY: &str = "io.modelcontextprotocol/related-task";

/// An opaque progress token: either a string or an integer, carried in
/// `_meta.progressToken` and echoed back on `notifications/progress`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Integer(i64),
}

/// The `_meta` member attachable to any request params, result, or
/// notification params: a progress token, a related-task id, and any
/// further extension keys the peer may have set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,

    #[serde(rename = "io.modelcontextprotocol/related-task", skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RequestMeta {
    pub fn with_progress_token(token: ProgressToken) -> Self {
        Self { progress_token: Some(token), ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_token_round_trips_both_shapes() {
        let meta = RequestMeta::with_progress_token(ProgressToken::String("t1".into()));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["progressToken"], "t1");

        let meta = RequestMeta::with_progress_token(ProgressToken::Integer(5));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["progressToken"], 5);
    }

    #[test]
    fn related_task_key_uses_namespaced_form() {
        let meta = RequestMeta { related_task_id: Some("task-1".into()), ..Default::default() };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["io.modelcontextprotocol/related-task"], "task-1");
    }
}
