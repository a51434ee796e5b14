//! Types shared by the client and server halves of the streamable HTTP
//! transport: SSE framing, the resumable event store, and session state.
//! Neither the client (`conduit-http`) nor the server (`conduit-transport`)
//! duplicates this logic — both depend on this crate.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

mod event_store;
mod session;
mod sse;

pub use conduit_transport_traits::{SessionId, MAX_SESSION_ID_LEN};
pub use event_store::{EventId, EventStore, InMemoryEventStore};
pub use session::{Session, SessionState};
pub use sse::{encode, encode_keepalive, SseEvent, SseParser};
