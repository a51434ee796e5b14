//! Axum handlers for the single MCP endpoint: `POST` (request/response or
//! notification/response acknowledgement), `GET` (the persistent SSE
//! stream), `DELETE` (session termination).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::body::Bytes;
use axum::routing::get;
use axum::{Json, Router as AxumRouter};
use conduit_protocol::envelope::{JsonRpcMessage, JsonRpcSingleMessage};
use conduit_protocol::methods;
use conduit_server::Router as McpRouter;
use conduit_transport_streamable::SessionId;

use crate::config::StreamableHttpServerConfig;
use crate::hub::{with_session, SessionHub};
use crate::origin::validate_origin;

#[derive(Clone)]
struct AppState {
    router: Arc<McpRouter>,
    hub: Arc<SessionHub>,
    config: Arc<StreamableHttpServerConfig>,
}

/// Builds the axum router serving `config.endpoint_path` with `GET`/`POST`/
/// `DELETE`, backed by `router` for dispatch and `hub` for session/SSE
/// state. The caller owns binding and serving (see the donor's
/// `run_server` for the `axum::serve` + `into_make_service_with_connect_info`
/// shape this expects to run under).
pub fn build_router(router: Arc<McpRouter>, hub: Arc<SessionHub>, config: StreamableHttpServerConfig) -> AxumRouter {
    let endpoint_path = config.endpoint_path.clone();
    let state = AppState { router, hub, config: Arc::new(config) };
    AxumRouter::new()
        .route(&endpoint_path, get(get_handler).post(post_handler).delete(delete_handler))
        .with_state(state)
}

fn validate(state: &AppState, headers: &HeaderMap, client_ip: IpAddr) -> Result<(), StatusCode> {
    validate_origin(&state.config.origin, headers, client_ip).map_err(|reason| {
        tracing::warn!(reason, %client_ip, "origin validation failed");
        StatusCode::FORBIDDEN
    })
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers.get("Mcp-Session-Id").and_then(|v| v.to_str().ok()).and_then(SessionId::try_from_string)
}

fn session_header(id: &SessionId) -> HeaderValue {
    HeaderValue::from_str(id.as_str()).expect("session id is always a valid header value")
}

async fn get_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(status) = validate(&state, &headers, addr.ip()) {
        return status.into_response();
    }

    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !accept.contains("text/event-stream") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let Some(session_id) = session_id_from_headers(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(session_id) = state.hub.lookup(&session_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let last_event_id = headers.get("Last-Event-ID").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let (replay, mut rx) = state.hub.open_stream(&session_id, last_event_id.as_deref());
    let keep_alive = state.config.keep_alive;

    let stream = async_stream::stream! {
        for event in replay {
            yield Ok::<Bytes, std::convert::Infallible>(Bytes::from(conduit_transport_streamable::encode(&event)));
        }
        loop {
            match tokio::time::timeout(keep_alive, rx.recv()).await {
                Ok(Some(event)) => yield Ok(Bytes::from(conduit_transport_streamable::encode(&event))),
                Ok(None) => break,
                Err(_) => yield Ok(Bytes::from(conduit_transport_streamable::encode_keepalive())),
            }
        }
    };

    let mut response = Response::new(axum::body::Body::from_stream(stream));
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response.headers_mut().insert("Mcp-Session-Id", session_header(&session_id));
    response
}

async fn post_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = validate(&state, &headers, addr.ip()) {
        return status.into_response();
    }

    let Ok(text) = std::str::from_utf8(&body) else {
        return (StatusCode::BAD_REQUEST, Json(parse_error_body())).into_response();
    };
    let message = match JsonRpcMessage::parse(text) {
        Ok(message) => message,
        Err(_) => return (StatusCode::BAD_REQUEST, Json(parse_error_body())).into_response(),
    };

    let existing = session_id_from_headers(&headers);
    match message {
        JsonRpcMessage::Single(single) => handle_single(&state, single, existing).await,
        JsonRpcMessage::Batch(items) => handle_batch(&state, items, existing).await,
    }
}

async fn handle_single(state: &AppState, message: JsonRpcSingleMessage, existing: Option<SessionId>) -> Response {
    match message {
        JsonRpcSingleMessage::Request(request) => {
            let session = if request.method == methods::INITIALIZE {
                Some(state.hub.create_session())
            } else {
                existing.and_then(|id| state.hub.lookup(&id))
            };
            let Some(session) = session else {
                return StatusCode::NOT_FOUND.into_response();
            };
            let response =
                with_session(session.clone(), state.router.route(request, Some(session.to_string()))).await;
            let mut resp = (StatusCode::OK, Json(response)).into_response();
            resp.headers_mut().insert("Mcp-Session-Id", session_header(&session));
            resp
        }
        JsonRpcSingleMessage::Notification(notification) => {
            let Some(session) = existing.and_then(|id| state.hub.lookup(&id)) else {
                return StatusCode::NOT_FOUND.into_response();
            };
            if notification.method == methods::NOTIFICATIONS_INITIALIZED {
                state.hub.activate(&session);
            }
            state.router.handle_notification(notification, Some(session.to_string()));
            StatusCode::ACCEPTED.into_response()
        }
        JsonRpcSingleMessage::Response(response) => {
            let Some(session) = existing else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            state.hub.resolve_pending(&session, response);
            StatusCode::ACCEPTED.into_response()
        }
    }
}

async fn handle_batch(state: &AppState, items: Vec<JsonRpcSingleMessage>, existing: Option<SessionId>) -> Response {
    let mut requests = Vec::new();
    for item in items {
        match item {
            JsonRpcSingleMessage::Request(request) => requests.push(request),
            JsonRpcSingleMessage::Notification(notification) => {
                if let Some(session) = existing.clone().and_then(|id| state.hub.lookup(&id)) {
                    if notification.method == methods::NOTIFICATIONS_INITIALIZED {
                        state.hub.activate(&session);
                    }
                    state.router.handle_notification(notification, Some(session.to_string()));
                }
            }
            JsonRpcSingleMessage::Response(response) => {
                if let Some(session) = &existing {
                    state.hub.resolve_pending(session, response);
                }
            }
        }
    }

    if requests.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }
    let Some(session) = existing.and_then(|id| state.hub.lookup(&id)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let responses =
        with_session(session.clone(), state.router.route_batch(requests, Some(session.to_string()))).await;
    let mut resp = (StatusCode::OK, Json(responses)).into_response();
    resp.headers_mut().insert("Mcp-Session-Id", session_header(&session));
    resp
}

async fn delete_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> StatusCode {
    if validate(&state, &headers, addr.ip()).is_err() {
        return StatusCode::FORBIDDEN;
    }
    match session_id_from_headers(&headers) {
        Some(id) => {
            state.hub.terminate(&id);
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    }
}

fn parse_error_body() -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32700, "message": "parse error" },
    })
}
