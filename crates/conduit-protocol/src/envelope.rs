//! JSON-RPC 2.0 envelope shapes shared by every MCP method: `Request`,
//! `Response`, `Notification`, and a batch of any of the three.

use crate::meta::RequestMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed `"jsonrpc":"2.0"` discriminator every envelope carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!("unsupported jsonrpc version: {s}")))
        }
    }
}

/// A JSON-RPC request id. Per spec this is a string or an integer, and its
/// original type must be preserved on the matching response — hence the
/// untagged enum rather than coercing everything to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Integer(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Integer(i) => write!(f, "{i}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(v: i64) -> Self {
        RequestId::Integer(v)
    }
}

impl From<String> for RequestId {
    fn from(v: String) -> Self {
        RequestId::String(v)
    }
}

impl From<&str> for RequestId {
    fn from(v: &str) -> Self {
        RequestId::String(v.to_string())
    }
}

/// An outbound or inbound JSON-RPC request: expects a matching [`JsonRpcResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, method: method.into(), params }
    }

    /// Extract the `_meta` member embedded in `params`, if any.
    pub fn meta(&self) -> Option<RequestMeta> {
        self.params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }
}

/// A fire-and-forget JSON-RPC notification: carries no id and expects no reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self { jsonrpc: JsonRpcVersion, method: method.into(), params }
    }

    pub fn meta(&self) -> Option<RequestMeta> {
        self.params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }
}

/// A structured JSON-RPC error, embedded in an error [`JsonRpcResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&conduit_core::Error> for JsonRpcError {
    fn from(err: &conduit_core::Error) -> Self {
        let mut json_err = JsonRpcError::new(err.kind().jsonrpc_code(), err.message().to_string());
        let ctx = err.context();
        if !ctx.annotations.is_empty() {
            json_err = json_err.with_data(serde_json::json!(ctx.annotations));
        }
        json_err
    }
}

/// The inverse of the `Error -> JsonRpcError` mapping above, for a caller
/// turning a peer's error response back into this SDK's own taxonomy.
impl From<&JsonRpcError> for conduit_core::Error {
    fn from(err: &JsonRpcError) -> Self {
        conduit_core::Error::new(conduit_core::ErrorKind::from_jsonrpc_code(err.code), err.message.clone())
    }
}

/// The payload of a response: either a `result` or an `error`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Result { result: serde_json::Value },
    Error { error: JsonRpcError },
}

/// A JSON-RPC response matching some earlier request's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, payload: JsonRpcResponsePayload::Result { result } }
    }

    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, payload: JsonRpcResponsePayload::Error { error } }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Result { .. })
    }
}

/// A JSON array of envelopes, submitted or replied to as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonRpcBatch<T>(pub Vec<T>);

impl<T> JsonRpcBatch<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(items)
    }
}

/// Any shape that may arrive over the wire: a single request, response, or
/// notification, or a batch of any of those.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Batch(Vec<JsonRpcSingleMessage>),
    Single(JsonRpcSingleMessage),
}

/// One non-batched envelope. Distinguished on decode by field shape: a
/// response has `result`/`error`, a request has `id` + `method`, a
/// notification has `method` with no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcSingleMessage {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("envelope always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_preserves_integer_type() {
        let req = JsonRpcRequest::new(RequestId::Integer(7), "ping", None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["id"], serde_json::json!(7));
    }

    #[test]
    fn request_id_preserves_string_type() {
        let req = JsonRpcRequest::new(RequestId::from("abc"), "ping", None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["id"], serde_json::json!("abc"));
    }

    #[test]
    fn notification_has_no_id_field() {
        let notif = JsonRpcNotification::new("notifications/initialized", None);
        let json = serde_json::to_value(&notif).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn response_payload_is_exclusively_result_or_error() {
        let ok = JsonRpcResponse::success(RequestId::Integer(1), serde_json::json!({"a": 1}));
        assert!(ok.is_success());
        let err = JsonRpcResponse::failure(RequestId::Integer(1), JsonRpcError::new(-32601, "nope"));
        assert!(!err.is_success());
    }

    #[test]
    fn json_rpc_error_round_trips_through_core_error_kind() {
        let json_err = JsonRpcError::new(-32601, "method not found: tools/call");
        let core: conduit_core::Error = (&json_err).into();
        assert_eq!(core.kind(), conduit_core::ErrorKind::MethodNotFound);
        let back = JsonRpcError::from(&core);
        assert_eq!(back.code, -32601);
    }

    #[test]
    fn single_message_roundtrips_through_jsonrpcmessage_parse() {
        let req = JsonRpcRequest::new(RequestId::Integer(1), "initialize", None);
        let text = serde_json::to_string(&req).unwrap();
        let parsed = JsonRpcMessage::parse(&text).unwrap();
        match parsed {
            JsonRpcMessage::Single(JsonRpcSingleMessage::Request(r)) => assert_eq!(r.method, "initialize"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn batch_of_requests_parses_as_batch() {
        let batch = serde_json::json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping"},
            {"jsonrpc": "2.0", "method": "notifications/initialized"}
        ]);
        let parsed: JsonRpcMessage = serde_json::from_value(batch).unwrap();
        match parsed {
            JsonRpcMessage::Batch(items) => assert_eq!(items.len(), 2),
            other => panic!("expected a batch, got {other:?}"),
        }
    }
}
