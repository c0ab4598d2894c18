//! HTTP long-polling transport

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use super::{engine_error, EngineErrorCode, Flow, ServerState};
use crate::events::DisconnectReason;
use crate::metrics;
use crate::protocol::{
    decode_payload, encode_payload, EnginePacket, PayloadEncoding, ProtocolVersion,
};
use crate::session::{Session, TransportKind};

/// `GET` without sid: open a session
pub(crate) async fn open(state: &ServerState, version: ProtocolVersion, b64: bool) -> Response {
    let session = state.registry.create(version, TransportKind::Polling);
    metrics::record_session_opened(TransportKind::Polling.as_str());
    metrics::set_sessions_active(state.registry.len());

    let open = match state.handshake(&session, &["websocket"]) {
        Ok(packet) => packet,
        Err(e) => {
            error!(error = %e, "failed to encode handshake");
            state.registry.remove(session.sid());
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    info!(sid = session.sid(), eio = version.as_str(), transport = "polling", "session opened");

    if version == ProtocolVersion::V3 {
        state.connect_implicit(&session).await;
    }

    let mut packets = vec![open];
    packets.extend(session.drain());
    payload_response(&packets, PayloadEncoding::for_request(version, b64))
}

/// `GET` with sid: hand out queued packets, waiting up to one ping interval
pub(crate) async fn poll(state: &ServerState, session: Arc<Session>, b64: bool) -> Response {
    if session.is_upgraded() {
        debug!(sid = session.sid(), "poll on upgraded session");
        return engine_error(EngineErrorCode::BadRequest);
    }
    if !session.try_begin_poll() {
        warn!(sid = session.sid(), "overlapping poll requests");
        metrics::record_protocol_error("overlapping_poll");
        state
            .close_session(session.sid(), DisconnectReason::ProtocolError)
            .await;
        return engine_error(EngineErrorCode::BadRequest);
    }

    session.touch();
    let packets = wait_for_packets(state, &session).await;
    session.end_poll();
    session.touch();

    payload_response(
        &packets,
        PayloadEncoding::for_request(session.version(), b64),
    )
}

async fn wait_for_packets(state: &ServerState, session: &Session) -> Vec<EnginePacket> {
    let deadline = tokio::time::Instant::now() + state.ping_interval();

    loop {
        let packets = session.drain();
        if !packets.is_empty() {
            return packets;
        }
        if session.is_closed() {
            return vec![EnginePacket::Close];
        }

        tokio::select! {
            _ = session.notified() => {}
            _ = tokio::time::sleep_until(deadline) => {
                // v4 heartbeat rides on the poll; v3 clients ping us instead
                return vec![match session.version() {
                    ProtocolVersion::V4 => EnginePacket::Ping(String::new()),
                    ProtocolVersion::V3 => EnginePacket::Noop,
                }];
            }
        }
    }
}

/// `POST` with sid: client packets
pub(crate) async fn receive(state: &ServerState, session: Arc<Session>, body: Bytes) -> Response {
    session.touch();

    let packets = match decode_payload(&body, session.version()) {
        Ok(packets) => packets,
        Err(e) => {
            warn!(sid = session.sid(), error = %e, "bad polling payload");
            metrics::record_protocol_error("payload");
            state
                .close_session(session.sid(), DisconnectReason::ProtocolError)
                .await;
            return engine_error(EngineErrorCode::BadRequest);
        }
    };

    for packet in packets {
        match state.handle_packet(&session, packet).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Closed) => break,
            Err(e) => {
                warn!(sid = session.sid(), error = %e, "bad packet");
                metrics::record_protocol_error("packet");
                state
                    .close_session(session.sid(), DisconnectReason::ProtocolError)
                    .await;
                return engine_error(EngineErrorCode::BadRequest);
            }
        }
    }

    ([(header::CONTENT_TYPE, "text/html")], "ok").into_response()
}

fn payload_response(packets: &[EnginePacket], encoding: PayloadEncoding) -> Response {
    (
        [(header::CONTENT_TYPE, encoding.content_type())],
        encode_payload(packets, encoding),
    )
        .into_response()
}
