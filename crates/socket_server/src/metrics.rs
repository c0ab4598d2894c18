//! Transport metrics

use metrics::{counter, gauge};

pub const SESSIONS_OPENED: &str = "drive_bridge_sessions_opened_total";
pub const SESSIONS_CLOSED: &str = "drive_bridge_sessions_closed_total";
pub const SESSIONS_ACTIVE: &str = "drive_bridge_sessions_active";
pub const PROTOCOL_ERRORS: &str = "drive_bridge_protocol_errors_total";
pub const PACKETS_DROPPED: &str = "drive_bridge_outbound_packets_dropped_total";
pub const EVENTS_DROPPED: &str = "drive_bridge_inbound_events_dropped_total";

pub fn record_session_opened(transport: &'static str) {
    counter!(SESSIONS_OPENED, "transport" => transport).increment(1);
}

pub fn record_session_closed(reason: &'static str, active: usize) {
    counter!(SESSIONS_CLOSED, "reason" => reason).increment(1);
    gauge!(SESSIONS_ACTIVE).set(active as f64);
}

pub fn set_sessions_active(active: usize) {
    gauge!(SESSIONS_ACTIVE).set(active as f64);
}

pub fn record_protocol_error(kind: &'static str) {
    counter!(PROTOCOL_ERRORS, "kind" => kind).increment(1);
}

pub fn record_packets_dropped(count: u64) {
    counter!(PACKETS_DROPPED).increment(count);
}

/// Telemetry dropped because the driver queue was full
pub fn record_event_dropped() {
    counter!(EVENTS_DROPPED).increment(1);
}
