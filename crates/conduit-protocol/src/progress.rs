//! Payloads for the two session-engine notifications that aren't tied to a
//! registry: `notifications/progress` and `notifications/cancelled`
//! (spec.md §4.1 "Progress" and "Cancellation propagation").

use crate::envelope::RequestId;
use crate::meta::ProgressToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_params_omit_absent_total_and_message() {
        let params = ProgressParams {
            progress_token: ProgressToken::Integer(1),
            progress: 0.5,
            total: None,
            message: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("total").is_none());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn cancelled_params_use_camel_case_request_id() {
        let params = CancelledParams { request_id: RequestId::Integer(7), reason: Some("timeout".into()) };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["requestId"], 7);
    }
}
