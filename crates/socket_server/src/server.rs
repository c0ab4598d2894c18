//! Socket.IO server over axum
//!
//! One route, `/socket.io/`, dispatching on the Engine.IO query string.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use contracts::ServerConfig;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::events::{DisconnectReason, ServerEvent};
use crate::protocol::ProtocolVersion;
use crate::session::SessionRegistry;
use crate::transport::{
    engine_error, polling, reap_stale, websocket, EngineErrorCode, ServerState,
};

/// How long `shutdown` waits for in-flight requests
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Engine.IO query string
#[derive(Debug, Deserialize)]
struct EngineQuery {
    #[serde(rename = "EIO")]
    eio: Option<String>,
    transport: Option<String>,
    sid: Option<String>,
    b64: Option<String>,
}

impl EngineQuery {
    fn b64(&self) -> bool {
        matches!(self.b64.as_deref(), Some("1") | Some("true"))
    }
}

/// Socket.IO server, not yet listening
pub struct SocketServer {
    state: Arc<ServerState>,
}

impl SocketServer {
    /// Create the server and the receiver its events arrive on
    pub fn new(config: ServerConfig) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (events, rx) = mpsc::channel(config.event_queue.max(1));
        let registry = Arc::new(SessionRegistry::new(config.event_queue));
        let state = Arc::new(ServerState {
            config,
            registry,
            events,
        });
        (Self { state }, rx)
    }

    /// Handle for emitting events to connected clients
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(Arc::clone(&self.state.registry))
    }

    /// The axum router serving `/socket.io/`
    pub fn router(&self) -> Router {
        Router::new()
            .route("/socket.io/", get(handle_get).post(handle_post))
            .route("/socket.io", get(handle_get).post(handle_post))
            .layer(DefaultBodyLimit::max(self.state.config.max_payload))
            .with_state(Arc::clone(&self.state))
    }

    /// Serve on `listener` in a background task
    pub fn spawn(self, listener: TcpListener) -> Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        let reaper = tokio::spawn(reap_stale(Arc::clone(&self.state)));

        info!(%local_addr, "socket server listening");

        Ok(ServerHandle {
            local_addr,
            state: self.state,
            shutdown: Some(shutdown_tx),
            server,
            reaper,
        })
    }
}

/// Bind-and-go shorthand for `SocketServer::new` + `spawn`
pub fn serve(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(ServerHandle, Broadcaster, mpsc::Receiver<ServerEvent>)> {
    let (server, events) = SocketServer::new(config);
    let broadcaster = server.broadcaster();
    let handle = server.spawn(listener)?;
    Ok((handle, broadcaster, events))
}

/// Running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<std::io::Result<()>>,
    reaper: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sessions currently open
    pub fn session_count(&self) -> usize {
        self.state.registry.len()
    }

    /// Stop accepting, close every session, wait for the listener task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.reaper.abort();

        for sid in self.state.registry.sids() {
            self.state
                .close_session(&sid, DisconnectReason::ServerShutdown)
                .await;
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.server).await {
            Ok(Ok(Ok(()))) => info!("socket server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "socket server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "socket server task failed"),
            Err(_) => {
                warn!("socket server did not stop in time, aborting");
                self.server.abort();
            }
        }
    }
}

async fn handle_get(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<EngineQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let Ok(version) = ProtocolVersion::from_query(query.eio.as_deref()) else {
        return engine_error(EngineErrorCode::UnsupportedVersion);
    };

    match query.transport.as_deref() {
        Some("polling") => match query.sid.as_deref() {
            None => polling::open(&state, version, query.b64()).await,
            Some(sid) => match state.registry.get(sid) {
                Some(session) => polling::poll(&state, session, query.b64()).await,
                None => engine_error(EngineErrorCode::UnknownSid),
            },
        },
        Some("websocket") => {
            let Some(ws) = ws else {
                return engine_error(EngineErrorCode::BadRequest);
            };
            let ws = ws.max_message_size(state.config.max_payload);

            match query.sid.as_deref() {
                None => ws.on_upgrade(move |socket| websocket::run_direct(state, version, socket)),
                Some(sid) => match state.registry.get(sid) {
                    Some(session) if !session.is_upgraded() => ws.on_upgrade(move |socket| {
                        websocket::run_upgrade(state, session, socket)
                    }),
                    Some(_) => engine_error(EngineErrorCode::BadRequest),
                    None => engine_error(EngineErrorCode::UnknownSid),
                },
            }
        }
        _ => engine_error(EngineErrorCode::UnknownTransport),
    }
}

async fn handle_post(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<EngineQuery>,
    body: Bytes,
) -> Response {
    if ProtocolVersion::from_query(query.eio.as_deref()).is_err() {
        return engine_error(EngineErrorCode::UnsupportedVersion);
    }
    if query.transport.as_deref() != Some("polling") {
        return engine_error(EngineErrorCode::UnknownTransport);
    }

    match query.sid.as_deref().and_then(|sid| state.registry.get(sid)) {
        Some(session) => polling::receive(&state, session, body).await,
        None => engine_error(EngineErrorCode::UnknownSid),
    }
}
