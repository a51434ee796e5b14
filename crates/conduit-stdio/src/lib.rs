//! Newline-delimited JSON transport over stdin/stdout.
//!
//! Per MCP's stdio transport rules: one JSON-RPC message per line, UTF-8
//! encoded, no embedded newlines — logging must go to stderr (left to the
//! caller's `tracing` subscriber) so it never corrupts the stream.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Mutex as StdMutex;

use conduit_transport_traits::{
    validate_request_size, validate_response_size, BidirectionalTransport, LimitsConfig,
    Transport, TransportCapabilities, TransportError, TransportMessage, TransportMessageMetadata,
    TransportResult, TransportState, TransportType,
};
use futures::{SinkExt, StreamExt};
use tokio::io::{BufReader, Stdin, Stdout};
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, trace, warn};

type StdinReader = FramedRead<BufReader<Stdin>, LinesCodec>;
type StdoutWriter = FramedWrite<Stdout, LinesCodec>;

/// Stdio transport. Holds its mutable I/O state behind locks so it can be
/// shared behind an `Arc` and driven from multiple tasks the way the
/// session engine expects.
pub struct StdioTransport {
    state: StdMutex<TransportState>,
    capabilities: TransportCapabilities,
    limits: LimitsConfig,
    stdout_writer: TokioMutex<Option<StdoutWriter>>,
    receiver: TokioMutex<Option<mpsc::Receiver<TransportMessage>>>,
    reader_task: TokioMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport").field("state", &self.state.lock().unwrap()).finish()
    }
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::with_limits(LimitsConfig::default())
    }

    pub fn with_limits(limits: LimitsConfig) -> Self {
        Self {
            state: StdMutex::new(TransportState::Disconnected),
            capabilities: TransportCapabilities {
                supports_streaming: false,
                supports_resumability: false,
                supports_sessions: false,
                ..TransportCapabilities::default()
            },
            limits,
            stdout_writer: TokioMutex::new(None),
            receiver: TokioMutex::new(None),
            reader_task: TokioMutex::new(None),
        }
    }

    fn set_state(&self, new_state: TransportState) {
        let mut state = self.state.lock().expect("stdio transport state mutex poisoned");
        if *state != new_state {
            trace!(from = %*state, to = %new_state, "stdio transport state change");
            *state = new_state;
        }
    }

    async fn setup_streams(&self) -> TransportResult<()> {
        let mut stdin_reader = FramedRead::new(BufReader::new(tokio::io::stdin()), LinesCodec::new());
        *self.stdout_writer.lock().await = Some(FramedWrite::new(tokio::io::stdout(), LinesCodec::new()));

        let (tx, rx) = mpsc::channel(1000);
        *self.receiver.lock().await = Some(rx);

        let limits = self.limits.clone();
        let handle = tokio::spawn(async move {
            while let Some(result) = stdin_reader.next().await {
                match result {
                    Ok(line) => {
                        if let Err(e) = validate_response_size(line.len(), &limits) {
                            error!(error = %e, "stdio line exceeded response size limit");
                            continue;
                        }
                        match parse_message(&line) {
                            Ok(message) => {
                                if let Err(mpsc::error::TrySendError::Closed(_)) =
                                    tx.try_send(message)
                                {
                                    debug!("stdio receive channel closed, stopping reader");
                                    break;
                                }
                            }
                            Err(e) => error!(error = %e, "failed to parse stdio line"),
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "failed to read from stdin");
                        break;
                    }
                }
            }
            debug!("stdio reader task exiting");
        });
        *self.reader_task.lock().await = Some(handle);
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one line of stdin into a [`TransportMessage`], rejecting blank
/// lines per the framing rule (one message per line, no empty frames).
fn parse_message(line: &str) -> TransportResult<TransportMessage> {
    let line = line.trim();
    if line.is_empty() {
        return Err(TransportError::ProtocolError("empty stdio line".into()));
    }
    let _: serde_json::Value =
        serde_json::from_str(line).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
    Ok(TransportMessage::new(None, line.to_string())
        .with_metadata(TransportMessageMetadata::with_content_type("application/json")))
}

/// Serializes a [`TransportMessage`] back to a single line, rejecting
/// embedded newlines — MCP's stdio framing forbids them outright.
fn serialize_message(message: &TransportMessage) -> TransportResult<String> {
    if message.payload.contains('\n') || message.payload.contains('\r') {
        return Err(TransportError::ProtocolError(
            "message contains embedded newlines, forbidden by stdio framing".into(),
        ));
    }
    let _: serde_json::Value = serde_json::from_str(&message.payload)
        .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
    Ok(message.payload.clone())
}

impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().expect("stdio transport state mutex poisoned").clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if matches!(*self.state.lock().unwrap(), TransportState::Connected) {
                return Ok(());
            }
            self.set_state(TransportState::Connecting);
            match self.setup_streams().await {
                Ok(()) => {
                    self.set_state(TransportState::Connected);
                    Ok(())
                }
                Err(e) => {
                    self.set_state(TransportState::Failed { reason: e.to_string() });
                    Err(e)
                }
            }
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.set_state(TransportState::Disconnecting);
            *self.stdout_writer.lock().await = None;
            *self.receiver.lock().await = None;
            if let Some(handle) = self.reader_task.lock().await.take() {
                handle.abort();
            }
            self.set_state(TransportState::Disconnected);
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !matches!(*self.state.lock().unwrap(), TransportState::Connected) {
                return Err(TransportError::ConnectionFailed("stdio transport not connected".into()));
            }
            let line = serialize_message(&message)?;
            validate_request_size(line.len(), &self.limits)?;

            let mut writer = self.stdout_writer.lock().await;
            let Some(writer) = writer.as_mut() else {
                return Err(TransportError::SendFailed("stdout writer not available".into()));
            };
            writer.send(line).await.map_err(|e| TransportError::SendFailed(e.to_string()))?;
            writer.flush().await.map_err(|e| TransportError::SendFailed(e.to_string()))?;
            Ok(())
        })
    }

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            if !matches!(*self.state.lock().unwrap(), TransportState::Connected) {
                return Err(TransportError::ConnectionFailed("stdio transport not connected".into()));
            }
            let mut receiver = self.receiver.lock().await;
            let Some(receiver) = receiver.as_mut() else {
                return Err(TransportError::ReceiveFailed("receive channel not available".into()));
            };
            match receiver.recv().await {
                Some(message) => Ok(Some(message)),
                None => {
                    warn!("stdio receive channel disconnected");
                    self.set_state(TransportState::Failed { reason: "receive channel closed".into() });
                    Err(TransportError::ReceiveFailed("channel disconnected".into()))
                }
            }
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some("stdio://".to_string())
    }
}

impl BidirectionalTransport for StdioTransport {
    fn send_request(
        &self,
        message: TransportMessage,
        timeout: Option<std::time::Duration>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>> {
        Box::pin(async move {
            self.send(message).await?;
            let recv = self.receive();
            match timeout {
                Some(duration) => tokio::time::timeout(duration, recv)
                    .await
                    .map_err(|_| TransportError::RequestTimeout {
                        operation: "stdio send_request".into(),
                        timeout: duration,
                    })?,
                None => recv.await,
            }?
            .ok_or_else(|| TransportError::ReceiveFailed("stdio stream closed".into()))
        })
    }
}
