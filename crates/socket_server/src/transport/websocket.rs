//! Websocket transport, direct or upgraded from polling

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::{Flow, ServerState};
use crate::events::DisconnectReason;
use crate::metrics;
use crate::protocol::{EnginePacket, ProtocolVersion};
use crate::session::{Session, TransportKind};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// `transport=websocket` without sid
pub(crate) async fn run_direct(state: Arc<ServerState>, version: ProtocolVersion, socket: WebSocket) {
    let session = state.registry.create(version, TransportKind::WebSocket);
    metrics::record_session_opened(TransportKind::WebSocket.as_str());
    metrics::set_sessions_active(state.registry.len());

    let (mut tx, mut rx) = socket.split();

    let open = match state.handshake(&session, &[]) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "failed to encode handshake");
            state
                .close_session(session.sid(), DisconnectReason::TransportError)
                .await;
            return;
        }
    };
    if tx.send(Message::Text(open.encode())).await.is_err() {
        state
            .close_session(session.sid(), DisconnectReason::TransportError)
            .await;
        return;
    }
    info!(sid = session.sid(), eio = version.as_str(), transport = "websocket", "session opened");

    if version == ProtocolVersion::V3 {
        state.connect_implicit(&session).await;
    }

    let reason = pump(&state, &session, &mut tx, &mut rx).await;
    finish(&state, &session, tx, reason).await;
}

/// `transport=websocket` with sid of a polling session
pub(crate) async fn run_upgrade(state: Arc<ServerState>, session: Arc<Session>, socket: WebSocket) {
    let (mut tx, mut rx) = socket.split();

    match tokio::time::timeout(state.ping_timeout(), probe(&session, &mut tx, &mut rx)).await {
        Ok(Ok(())) => {
            session.set_upgraded();
            info!(sid = session.sid(), "session upgraded to websocket");
        }
        Ok(Err(reason)) => {
            // Session carries on over polling
            debug!(sid = session.sid(), reason = %reason, "upgrade aborted");
            return;
        }
        Err(_) => {
            debug!(sid = session.sid(), "upgrade timed out");
            return;
        }
    }

    let reason = pump(&state, &session, &mut tx, &mut rx).await;
    finish(&state, &session, tx, reason).await;
}

/// `2probe` → `3probe`, release the pending poll, wait for `5`
async fn probe(session: &Session, tx: &mut WsSink, rx: &mut WsStream) -> Result<(), String> {
    loop {
        let text = match rx.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => return Err(format!("unexpected frame {other:?}")),
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("closed during upgrade".to_string()),
        };

        match EnginePacket::decode(&text).map_err(|e| e.to_string())? {
            EnginePacket::Ping(data) if data == "probe" => {
                tx.send(Message::Text(EnginePacket::Pong(data).encode()))
                    .await
                    .map_err(|e| e.to_string())?;
                session.push(EnginePacket::Noop);
            }
            EnginePacket::Upgrade => return Ok(()),
            other => return Err(format!("unexpected packet {other:?}")),
        }
    }
}

/// Move packets both ways until the session ends
async fn pump(
    state: &ServerState,
    session: &Session,
    tx: &mut WsSink,
    rx: &mut WsStream,
) -> DisconnectReason {
    let period = state.ping_interval();
    let max_idle = period + state.ping_timeout();
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    session.touch();

    loop {
        for packet in session.drain() {
            if tx.send(Message::Text(packet.encode())).await.is_err() {
                return DisconnectReason::TransportError;
            }
        }
        if session.is_closed() {
            return DisconnectReason::ServerShutdown;
        }

        tokio::select! {
            incoming = rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let packet = match EnginePacket::decode(&text) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!(sid = session.sid(), error = %e, "bad websocket packet");
                            metrics::record_protocol_error("packet");
                            return DisconnectReason::ProtocolError;
                        }
                    };
                    match state.handle_packet(session, packet).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Closed) => return DisconnectReason::TransportClose,
                        Err(e) => {
                            warn!(sid = session.sid(), error = %e, "bad packet");
                            metrics::record_protocol_error("packet");
                            return DisconnectReason::ProtocolError;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!(sid = session.sid(), "binary frame on text-only session");
                    metrics::record_protocol_error("binary");
                    return DisconnectReason::ProtocolError;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => session.touch(),
                Some(Ok(Message::Close(_))) | None => return DisconnectReason::TransportClose,
                Some(Err(e)) => {
                    debug!(sid = session.sid(), error = %e, "websocket error");
                    return DisconnectReason::TransportError;
                }
            },
            _ = session.notified() => {}
            _ = heartbeat.tick() => {
                if session.idle_for() > max_idle {
                    return DisconnectReason::PingTimeout;
                }
                if session.version() == ProtocolVersion::V4 {
                    session.push(EnginePacket::Ping(String::new()));
                }
            }
        }
    }
}

async fn finish(state: &ServerState, session: &Session, mut tx: WsSink, reason: DisconnectReason) {
    if reason != DisconnectReason::TransportError {
        let _ = tx.send(Message::Close(None)).await;
    }
    state.close_session(session.sid(), reason).await;
}
