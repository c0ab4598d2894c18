//! Transports and the packet handling they share

pub(crate) mod polling;
pub(crate) mod websocket;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::{ServerConfig, Telemetry};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::events::{DisconnectReason, ServerEvent};
use crate::metrics;
use crate::protocol::{EnginePacket, Handshake, ProtocolVersion, SocketPacket, SocketPacketKind};
use crate::session::{Session, SessionRegistry};

/// Lifecycle events wait this long for room in the driver queue
const LIFECYCLE_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// What the caller should do after a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Closed,
}

/// State shared by every request handler
#[derive(Debug)]
pub(crate) struct ServerState {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub events: mpsc::Sender<ServerEvent>,
}

impl ServerState {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.config.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.config.ping_timeout_ms)
    }

    /// Open packet for a session
    pub fn handshake(&self, session: &Session, upgrades: &[&str]) -> Result<EnginePacket> {
        Handshake {
            sid: session.sid().to_string(),
            upgrades: upgrades.iter().map(|u| u.to_string()).collect(),
            ping_interval: self.config.ping_interval_ms,
            ping_timeout: self.config.ping_timeout_ms,
            max_payload: (session.version() == ProtocolVersion::V4)
                .then_some(self.config.max_payload as u64),
        }
        .into_packet()
    }

    /// v3 joins the default namespace as soon as the session opens
    pub async fn connect_implicit(&self, session: &Session) {
        if !session.set_connected(true) {
            session.push(EnginePacket::Message(
                SocketPacket::connect_ack(session.version(), session.socket_id()).encode(),
            ));
            info!(sid = session.sid(), "client connected");
            self.emit_lifecycle(ServerEvent::Connected {
                sid: session.sid().to_string(),
            })
            .await;
        }
    }

    /// Apply one client packet to its session
    pub async fn handle_packet(&self, session: &Session, packet: EnginePacket) -> Result<Flow> {
        session.touch();

        match packet {
            EnginePacket::Ping(data) => {
                session.push(EnginePacket::Pong(data));
            }
            EnginePacket::Pong(_) => {}
            EnginePacket::Message(text) => self.handle_message(session, &text).await?,
            EnginePacket::Close => {
                self.close_session(session.sid(), DisconnectReason::TransportClose)
                    .await;
                return Ok(Flow::Closed);
            }
            other @ (EnginePacket::Open(_) | EnginePacket::Upgrade | EnginePacket::Noop) => {
                trace!(sid = session.sid(), packet = ?other, "ignoring packet");
            }
        }

        Ok(Flow::Continue)
    }

    async fn handle_message(&self, session: &Session, text: &str) -> Result<()> {
        let packet = SocketPacket::decode(text)?;

        match packet.kind {
            SocketPacketKind::Connect => {
                if !packet.is_default_namespace() {
                    debug!(sid = session.sid(), namespace = %packet.namespace, "refusing namespace");
                    session.push(EnginePacket::Message(
                        SocketPacket::connect_error(session.version(), &packet.namespace).encode(),
                    ));
                    return Ok(());
                }
                self.connect_implicit(session).await;
            }
            SocketPacketKind::Disconnect => {
                if packet.is_default_namespace() && session.set_connected(false) {
                    info!(sid = session.sid(), "client left namespace");
                    self.emit_lifecycle(ServerEvent::Disconnected {
                        sid: session.sid().to_string(),
                        reason: DisconnectReason::ClientDisconnect,
                    })
                    .await;
                }
            }
            SocketPacketKind::Event => {
                if !packet.is_default_namespace() || !session.is_connected() {
                    debug!(sid = session.sid(), namespace = %packet.namespace, "event outside a joined namespace");
                    return Ok(());
                }
                if let Some(id) = packet.ack_id {
                    session.push(EnginePacket::Message(
                        SocketPacket::ack(&packet.namespace, id, Vec::new()).encode(),
                    ));
                }
                match packet.event_name() {
                    Some("telemetry") => self.on_telemetry(session, packet.event_args().first()),
                    Some(name) => debug!(sid = session.sid(), event = name, "ignoring event"),
                    None => {}
                }
            }
            SocketPacketKind::Ack | SocketPacketKind::ConnectError => {
                trace!(sid = session.sid(), kind = ?packet.kind, "ignoring packet");
            }
        }

        Ok(())
    }

    fn on_telemetry(&self, session: &Session, data: Option<&Value>) {
        let sid = session.sid().to_string();

        let event = match data {
            None | Some(Value::Null) => ServerEvent::Manual { sid },
            Some(Value::Object(map)) if map.is_empty() => ServerEvent::Manual { sid },
            Some(value) => match Telemetry::deserialize(value) {
                Ok(telemetry) => ServerEvent::Telemetry { sid, telemetry },
                Err(e) => {
                    warn!(sid = session.sid(), error = %e, "invalid telemetry payload");
                    metrics::record_protocol_error("telemetry_payload");
                    return;
                }
            },
        };

        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(sid = session.sid(), "driver busy, telemetry dropped");
                metrics::record_event_dropped();
            }
            Err(TrySendError::Closed(_)) => {
                debug!(sid = session.sid(), "event receiver gone");
            }
        }
    }

    /// Remove a session, telling the application if it was connected
    pub async fn close_session(&self, sid: &str, reason: DisconnectReason) {
        let Some(session) = self.registry.remove(sid) else {
            return;
        };
        session.close();

        let dropped = session.dropped();
        if dropped > 0 {
            metrics::record_packets_dropped(dropped);
        }
        metrics::record_session_closed(reason.as_str(), self.registry.len());
        info!(sid, %reason, transport = session.transport().as_str(), "session closed");

        if session.set_connected(false) {
            self.emit_lifecycle(ServerEvent::Disconnected {
                sid: sid.to_string(),
                reason,
            })
            .await;
        }
    }

    async fn emit_lifecycle(&self, event: ServerEvent) {
        if let Err(e) = self.events.send_timeout(event, LIFECYCLE_SEND_TIMEOUT).await {
            debug!(error = %e, "lifecycle event not delivered");
        }
    }
}

/// Close sessions that stopped talking
pub(crate) async fn reap_stale(state: Arc<ServerState>) {
    let period = state.ping_interval();
    let max_idle = state.ping_interval() + state.ping_timeout();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        ticker.tick().await;
        for sid in state.registry.stale(max_idle) {
            warn!(sid = %sid, "session timed out");
            state.close_session(&sid, DisconnectReason::PingTimeout).await;
        }
    }
}

/// Engine.IO error codes, returned as `{"code":..,"message":..}` with HTTP 400
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineErrorCode {
    UnknownTransport = 0,
    UnknownSid = 1,
    BadRequest = 3,
    UnsupportedVersion = 5,
}

impl EngineErrorCode {
    fn message(&self) -> &'static str {
        match self {
            Self::UnknownTransport => "Transport unknown",
            Self::UnknownSid => "Session ID unknown",
            Self::BadRequest => "Bad request",
            Self::UnsupportedVersion => "Unsupported protocol version",
        }
    }
}

pub(crate) fn engine_error(code: EngineErrorCode) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "code": code as u8, "message": code.message() })),
    )
        .into_response()
}
