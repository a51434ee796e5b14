//! Session identifiers shared by every stateful transport.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum allowed session ID length, matching the `Mcp-Session-Id` header
/// budget — long enough for any reasonable encoding, short enough to bound
/// memory use in session storage.
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Unique identifier for an MCP session, issued by the server on
/// `initialize` and echoed back via `Mcp-Session-Id` on every subsequent
/// request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a cryptographically random session id of the form
    /// `mcp-{32 hex digits}` (128 bits of entropy), panicking if the OS CSPRNG
    /// is unavailable — a predictable id would make sessions guessable.
    pub fn new() -> Self {
        Self::try_new().expect(
            "cryptographic random number generator unavailable; refusing to mint a weak session id",
        )
    }

    /// Fallible counterpart to [`SessionId::new`].
    pub fn try_new() -> Option<Self> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).ok()?;
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Some(Self(format!("mcp-{hex}")))
    }

    /// Wraps an externally supplied string (e.g. from an incoming header),
    /// panicking if it exceeds [`MAX_SESSION_ID_LEN`].
    pub fn from_string(s: impl Into<String>) -> Self {
        let s = s.into();
        assert!(s.len() <= MAX_SESSION_ID_LEN, "session id exceeds {MAX_SESSION_ID_LEN} bytes");
        Self(s)
    }

    /// Fallible counterpart to [`SessionId::from_string`].
    pub fn try_from_string(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        (s.len() <= MAX_SESSION_ID_LEN).then_some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
