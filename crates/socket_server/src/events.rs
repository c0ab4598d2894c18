//! Events delivered to the application

use contracts::Telemetry;

/// Why a session left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Socket.IO `41` from the client
    ClientDisconnect,
    /// Engine.IO close packet
    TransportClose,
    /// Websocket dropped or errored
    TransportError,
    /// No activity within ping interval + timeout
    PingTimeout,
    /// Malformed packet
    ProtocolError,
    /// Server stopping
    ServerShutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnect => "client_disconnect",
            Self::TransportClose => "transport_close",
            Self::TransportError => "transport_error",
            Self::PingTimeout => "ping_timeout",
            Self::ProtocolError => "protocol_error",
            Self::ServerShutdown => "server_shutdown",
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Socket.IO level event from one session
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Client joined the default namespace
    Connected { sid: String },

    /// `telemetry` event with a payload
    Telemetry { sid: String, telemetry: Telemetry },

    /// `telemetry` event without data (simulator in manual mode)
    Manual { sid: String },

    /// Client left
    Disconnected {
        sid: String,
        reason: DisconnectReason,
    },
}

impl ServerEvent {
    pub fn sid(&self) -> &str {
        match self {
            Self::Connected { sid }
            | Self::Telemetry { sid, .. }
            | Self::Manual { sid }
            | Self::Disconnected { sid, .. } => sid,
        }
    }
}
