use serde::{Deserialize, Serialize};
use std::fmt;

/// A negotiated MCP protocol version, e.g. `2025-11-25`.
///
/// Supported values, latest first: `2025-11-25`, `2025-06-18`, `2025-03-26`,
/// `2024-11-05`. `2025-11-25` is offered by default; `2025-03-26` is assumed
/// for an HTTP request that arrives without a `Mcp-Protocol-Version` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    pub const V2025_11_25: &'static str = "2025-11-25";
    pub const V2025_06_18: &'static str = "2025-06-18";
    pub const V2025_03_26: &'static str = "2025-03-26";
    pub const V2024_11_05: &'static str = "2024-11-05";

    /// All versions this SDK understands, latest first.
    pub const SUPPORTED: &'static [&'static str] = &[
        Self::V2025_11_25,
        Self::V2025_06_18,
        Self::V2025_03_26,
        Self::V2024_11_05,
    ];

    /// The version a client offers by default at `initialize`.
    pub fn latest() -> Self {
        Self(Self::V2025_11_25.to_string())
    }

    /// The version assumed for an HTTP request with no protocol-version header.
    pub fn http_default() -> Self {
        Self(Self::V2025_03_26.to_string())
    }

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(&self.0.as_str())
    }

    /// Pick the version a server should reply with when a client offers
    /// `requested`: the requested version if supported, otherwise the
    /// latest version this SDK supports.
    pub fn negotiate(requested: &ProtocolVersion) -> ProtocolVersion {
        if requested.is_supported() {
            requested.clone()
        } else {
            ProtocolVersion::latest()
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
