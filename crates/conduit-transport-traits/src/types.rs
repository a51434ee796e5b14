//! Core transport types: kind, lifecycle state, capability advertisement.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LimitsConfig, TimeoutConfig};

/// Which transport an endpoint is speaking over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Newline-delimited JSON over stdin/stdout.
    Stdio,
    /// A single HTTP endpoint handling POST/GET/DELETE, with SSE for streaming.
    StreamableHttp,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// Lifecycle state of a transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Failed { reason: String },
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// What a particular transport implementation supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCapabilities {
    pub max_message_size: Option<usize>,
    pub supports_streaming: bool,
    pub supports_resumability: bool,
    pub supports_sessions: bool,
    pub custom: HashMap<String, serde_json::Value>,
}

impl Default for TransportCapabilities {
    fn default() -> Self {
        Self {
            max_message_size: Some(1024 * 1024),
            supports_streaming: false,
            supports_resumability: false,
            supports_sessions: false,
            custom: HashMap::new(),
        }
    }
}

/// Configuration handed to a transport at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub transport_type: TransportType,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    pub custom: HashMap<String, serde_json::Value>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: TransportType::Stdio,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            custom: HashMap::new(),
        }
    }
}
