use serde::{Deserialize, Serialize};

/// Sent server-to-client via `elicitation/create` to ask a human for input
/// the server can't otherwise obtain: either a schema-validated form or a
/// URL to visit (spec.md §3's client capability description).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ElicitationCreateParams {
    Form {
        message: String,
        requested_schema: serde_json::Value,
    },
    Url {
        message: String,
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationAction {
    Accept,
    Decline,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitationCreateResult {
    pub action: ElicitationAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decline_omits_content() {
        let result = ElicitationCreateResult { action: ElicitationAction::Decline, content: None };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("content").is_none());
    }

    #[test]
    fn form_params_round_trip() {
        let params = ElicitationCreateParams::Form {
            message: "confirm".into(),
            requested_schema: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["mode"], "form");
    }
}
