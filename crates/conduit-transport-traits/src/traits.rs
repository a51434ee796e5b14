//! The core `Transport` abstraction. Stdio and streamable-HTTP both implement
//! this trait; the session engine is written against it and never knows
//! which concrete transport it's driving.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::TransportResult;
use crate::message::TransportMessage;
use crate::types::{TransportCapabilities, TransportState, TransportType};

/// Asynchronous message-based communication channel: connect, send, receive,
/// disconnect.
pub trait Transport: Send + Sync + std::fmt::Debug {
    fn transport_type(&self) -> TransportType;

    fn capabilities(&self) -> &TransportCapabilities;

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>>;

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>>;

    /// `true` once [`Transport::state`] reports `Connected`.
    fn is_connected(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { matches!(self.state().await, TransportState::Connected) })
    }

    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Full-duplex transports that can correlate a request with its response —
/// both stdio (via request id) and streamable HTTP (via the POST response or
/// a GET-stream frame) implement this.
pub trait BidirectionalTransport: Transport {
    fn send_request(
        &self,
        message: TransportMessage,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>>;
}
