//! The managed, auto-reconnecting client wrapper (spec.md §4.7): owns a
//! transport *factory* rather than a transport, since most transports
//! cannot be reused once disconnected, and retries a failed operation once
//! after a successful reconnect. Handler registrations live on this wrapper
//! rather than on any one [`ClientEndpoint`], so they survive reconnection;
//! the session engine (in-flight correlation state) deliberately does not.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conduit_protocol::{methods, ToolDescriptor};
use conduit_transport_traits::Transport;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::endpoint::ClientEndpoint;
use crate::error::{is_recoverable, ClientError, ClientResult};
use crate::handler_registry::HandlerRegistry;
use crate::validator::OutputSchemaCache;

/// Builds a fresh, not-yet-connected transport for each (re)connection
/// attempt.
pub type TransportFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Invoked with the refreshed tool list after a full reconnect repopulates
/// the cache (spec.md §4.7: "a full reconnect refreshes the cached tool
/// list and fires `on_tools_changed`").
pub type ToolsChangedCallback = Arc<dyn Fn(Vec<ToolDescriptor>) + Send + Sync>;

/// The wrapper's connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Carries the current attempt number (1-based).
    Reconnecting(u32),
}

/// Backoff and health-check policy for reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
    pub ping_interval: Option<Duration>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            growth_factor: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl ReconnectPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.growth_factor.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// A client endpoint that reconnects itself on a recoverable failure and
/// retries the triggering operation once.
pub struct ManagedClient {
    transport_factory: TransportFactory,
    config: ClientConfig,
    policy: ReconnectPolicy,
    state: RwLock<ConnectionState>,
    endpoint: AsyncMutex<Option<Arc<ClientEndpoint>>>,
    reconnect_lock: AsyncMutex<()>,
    handlers: Arc<HandlerRegistry>,
    pub tool_cache: Arc<OutputSchemaCache>,
    on_tools_changed: RwLock<Option<ToolsChangedCallback>>,
    ping_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for ManagedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedClient").field("state", &*self.state.read()).finish()
    }
}

impl ManagedClient {
    pub fn new(transport_factory: TransportFactory, config: ClientConfig, policy: ReconnectPolicy) -> Arc<Self> {
        Arc::new(Self {
            transport_factory,
            config,
            policy,
            state: RwLock::new(ConnectionState::Disconnected),
            endpoint: AsyncMutex::new(None),
            reconnect_lock: AsyncMutex::new(()),
            handlers: Arc::new(HandlerRegistry::new()),
            tool_cache: Arc::new(OutputSchemaCache::new()),
            on_tools_changed: RwLock::new(None),
            ping_task: AsyncMutex::new(None),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn set_on_tools_changed(&self, callback: ToolsChangedCallback) {
        *self.on_tools_changed.write() = Some(callback);
    }

    /// Connects for the first time, starting the health-check ping loop if
    /// the policy configures one.
    pub async fn connect(self: &Arc<Self>) -> ClientResult<()> {
        *self.state.write() = ConnectionState::Connecting;
        let result = self.establish().await;
        match &result {
            Ok(()) => {
                *self.state.write() = ConnectionState::Connected;
                self.spawn_ping_loop();
            }
            Err(_) => *self.state.write() = ConnectionState::Disconnected,
        }
        result
    }

    async fn establish(self: &Arc<Self>) -> ClientResult<()> {
        let transport = (self.transport_factory)();
        let endpoint = ClientEndpoint::with_handlers(transport, self.config.clone(), Arc::clone(&self.handlers));
        endpoint.connect().await?;
        *self.endpoint.lock().await = Some(endpoint);
        self.refresh_tool_cache().await;
        Ok(())
    }

    async fn refresh_tool_cache(&self) {
        let Some(endpoint) = self.endpoint.lock().await.clone() else { return };
        let Ok(value) = endpoint.send_request(methods::TOOLS_LIST, serde_json::json!({}), Default::default()).await
        else {
            return;
        };
        let Ok(result) = serde_json::from_value::<conduit_protocol::tools::ListToolsResult>(value) else { return };
        self.tool_cache.refresh(&result.tools);
        if let Some(callback) = self.on_tools_changed.read().clone() {
            callback(result.tools);
        }
    }

    fn spawn_ping_loop(self: &Arc<Self>) {
        let Some(interval) = self.policy.ping_interval else { return };
        let managed = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let endpoint = managed.endpoint.lock().await.clone();
                let Some(endpoint) = endpoint else { break };
                let outcome = endpoint
                    .send_request(methods::PING, serde_json::json!({}), Default::default())
                    .await;
                if let Err(err) = outcome
                    && is_recoverable(&err)
                {
                    warn!(error = %err, "health-check ping failed, reconnecting");
                    if managed.reconnect().await.is_err() {
                        break;
                    }
                }
            }
        });
        if let Ok(mut slot) = self.ping_task.try_lock() {
            *slot = Some(handle);
        }
    }

    /// Runs `op` against the current endpoint; on a recoverable error,
    /// reconnects once (single-flight across concurrent callers) and
    /// retries `op` exactly once more.
    pub async fn call<F, Fut, T>(self: &Arc<Self>, op: F) -> ClientResult<T>
    where
        F: Fn(Arc<ClientEndpoint>) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let endpoint = self.current_endpoint().await?;
        match op(endpoint).await {
            Ok(value) => Ok(value),
            Err(err) if is_recoverable(&err) => {
                debug!(error = %err, "recoverable error, reconnecting before retrying once");
                self.reconnect().await?;
                let endpoint = self.current_endpoint().await?;
                op(endpoint).await
            }
            Err(err) => Err(err),
        }
    }

    async fn current_endpoint(self: &Arc<Self>) -> ClientResult<Arc<ClientEndpoint>> {
        if let Some(endpoint) = self.endpoint.lock().await.clone() {
            return Ok(endpoint);
        }
        self.connect().await?;
        self.endpoint
            .lock()
            .await
            .clone()
            .ok_or_else(|| ClientError::Internal("connect succeeded without installing an endpoint".to_string()))
    }

    /// Single-flight reconnection: concurrent callers that lose the race
    /// just wait for the winner's attempt to finish.
    pub async fn reconnect(self: &Arc<Self>) -> ClientResult<()> {
        let _guard = self.reconnect_lock.lock().await;
        if matches!(self.state(), ConnectionState::Connected) {
            return Ok(());
        }

        if let Some(old) = self.endpoint.lock().await.take() {
            let _ = old.disconnect().await;
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let Some(max) = self.policy.max_attempts
                && attempt > max
            {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(ClientError::ConnectionClosed(format!(
                    "exhausted {max} reconnection attempts"
                )));
            }
            *self.state.write() = ConnectionState::Reconnecting(attempt);
            tokio::time::sleep(self.policy.delay_for(attempt)).await;

            match self.establish().await {
                Ok(()) => {
                    info!(attempt, "reconnected");
                    *self.state.write() = ConnectionState::Connected;
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "reconnection attempt failed");
                }
            }
        }
    }

    pub async fn disconnect(&self) -> ClientResult<()> {
        if let Some(handle) = self.ping_task.lock().await.take() {
            handle.abort();
        }
        if let Some(endpoint) = self.endpoint.lock().await.take() {
            endpoint.disconnect().await?;
        }
        *self.state.write() = ConnectionState::Disconnected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::BatchRequest;
    use conduit_protocol::envelope::{JsonRpcRequest, JsonRpcResponse};
    use conduit_protocol::Implementation;
    use conduit_transport_traits::{
        TransportCapabilities, TransportMessage, TransportMessageMetadata, TransportResult, TransportState,
        TransportType,
    };
    use std::future::Future as StdFuture;
    use std::pin::Pin;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct ScriptedTransport {
        capabilities: TransportCapabilities,
        outbound: mpsc::UnboundedSender<String>,
        inbound: AsyncMutex<mpsc::UnboundedReceiver<TransportMessage>>,
        state: StdMutex<TransportState>,
        fail_connect: AtomicBool,
    }

    impl Transport for ScriptedTransport {
        fn transport_type(&self) -> TransportType {
            TransportType::Stdio
        }
        fn capabilities(&self) -> &TransportCapabilities {
            &self.capabilities
        }
        fn state(&self) -> Pin<Box<dyn StdFuture<Output = TransportState> + Send + '_>> {
            Box::pin(async move { *self.state.lock().unwrap() })
        }
        fn connect(&self) -> Pin<Box<dyn StdFuture<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async move {
                if self.fail_connect.load(Ordering::Relaxed) {
                    return Err(conduit_transport_traits::TransportError::ConnectionFailed("refused".into()));
                }
                *self.state.lock().unwrap() = TransportState::Connected;
                Ok(())
            })
        }
        fn disconnect(&self) -> Pin<Box<dyn StdFuture<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async move {
                *self.state.lock().unwrap() = TransportState::Disconnected;
                Ok(())
            })
        }
        fn send(&self, message: TransportMessage) -> Pin<Box<dyn StdFuture<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async move {
                let _ = self.outbound.send(message.payload);
                Ok(())
            })
        }
        fn receive(&self) -> Pin<Box<dyn StdFuture<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
            Box::pin(async move { Ok(self.inbound.lock().await.recv().await) })
        }
    }

    /// Drains the initialize request from `out_rx` and feeds back a minimal
    /// success reply plus an empty `tools/list` result, auto-answering
    /// everything a `connect()` call needs.
    async fn auto_answer_handshake(
        out_rx: &mut mpsc::UnboundedReceiver<String>,
        in_tx: &mpsc::UnboundedSender<TransportMessage>,
    ) {
        let sent = out_rx.recv().await.unwrap();
        let request: JsonRpcRequest = serde_json::from_str(&sent).unwrap();
        assert_eq!(request.method, methods::INITIALIZE);
        let response = JsonRpcResponse::success(
            request.id,
            serde_json::json!({
                "protocolVersion": conduit_protocol::ProtocolVersion::latest().as_str(),
                "capabilities": {},
                "serverInfo": {"name": "s", "version": "1"},
            }),
        );
        in_tx
            .send(TransportMessage::new(None, serde_json::to_string(&response).unwrap())
                .with_metadata(TransportMessageMetadata::default()))
            .unwrap();

        let _initialized_notification = out_rx.recv().await.unwrap();

        let tools_request: JsonRpcRequest = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(tools_request.method, methods::TOOLS_LIST);
        let tools_response = JsonRpcResponse::success(tools_request.id, serde_json::json!({"tools": []}));
        in_tx.send(TransportMessage::new(None, serde_json::to_string(&tools_response).unwrap())).unwrap();
    }

    #[tokio::test]
    async fn connect_reaches_the_connected_state() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport {
            capabilities: TransportCapabilities::default(),
            outbound: out_tx,
            inbound: AsyncMutex::new(in_rx),
            state: StdMutex::new(TransportState::Disconnected),
            fail_connect: AtomicBool::new(false),
        });
        let managed = ManagedClient::new(
            Arc::new(move || Arc::clone(&transport)),
            ClientConfig::new(Implementation::new("managed", "0.1.0")),
            ReconnectPolicy { ping_interval: None, ..Default::default() },
        );

        let connect = tokio::spawn({
            let managed = Arc::clone(&managed);
            async move { managed.connect().await }
        });
        auto_answer_handshake(&mut out_rx, &in_tx).await;
        connect.await.unwrap().unwrap();

        assert_eq!(managed.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn handler_registrations_survive_across_managed_client_lifetime() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport {
            capabilities: TransportCapabilities::default(),
            outbound: out_tx,
            inbound: AsyncMutex::new(in_rx),
            state: StdMutex::new(TransportState::Disconnected),
            fail_connect: AtomicBool::new(false),
        });
        let managed = ManagedClient::new(
            Arc::new(move || Arc::clone(&transport)),
            ClientConfig::new(Implementation::new("managed", "0.1.0")),
            ReconnectPolicy::default(),
        );
        managed.handlers().register_notification_handler(
            "notifications/message",
            Arc::new(|_params| {}),
        );
        assert_eq!(managed.handlers().notification_handlers("notifications/message").len(), 1);
    }

    #[tokio::test]
    async fn reconnect_retries_with_a_growing_delay_until_it_succeeds() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(1),
            growth_factor: 2.0,
            max_delay: Duration::from_millis(10),
            max_attempts: Some(5),
            ping_interval: None,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2));
        assert_eq!(policy.delay_for(10), Duration::from_millis(10));
    }

    #[allow(dead_code)]
    fn _batch_request_type_is_reachable(_b: BatchRequest) {}
}
