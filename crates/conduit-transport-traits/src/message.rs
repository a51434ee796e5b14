//! The transport-level envelope around one JSON-RPC payload.

use std::collections::HashMap;

use conduit_protocol::RequestId;
use serde::{Deserialize, Serialize};

const MAX_CUSTOM_HEADERS: usize = 64;

/// A single JSON-RPC payload in flight over a transport, plus the metadata a
/// transport needs to frame, correlate, and prioritize it. The payload is
/// carried pre-serialized: `conduit-wire`/`conduit-protocol` own encoding,
/// transports only move bytes.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub id: Option<RequestId>,
    pub payload: String,
    pub metadata: TransportMessageMetadata,
}

impl TransportMessage {
    pub fn new(id: Option<RequestId>, payload: impl Into<String>) -> Self {
        Self { id, payload: payload.into(), metadata: TransportMessageMetadata::default() }
    }

    pub fn with_metadata(mut self, metadata: TransportMessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Metadata accompanying a [`TransportMessage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportMessageMetadata {
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub is_heartbeat: bool,
}

impl TransportMessageMetadata {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.headers.len() > MAX_CUSTOM_HEADERS {
            return Err("too many custom headers");
        }
        Ok(())
    }

    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self { content_type: Some(content_type.into()), ..Default::default() }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn heartbeat() -> Self {
        Self { is_heartbeat: true, ..Default::default() }
    }
}
