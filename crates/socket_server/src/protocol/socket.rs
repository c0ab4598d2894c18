//! Socket.IO packets
//!
//! `<type>[/namespace,][ack id][json data]`, carried inside Engine.IO
//! `Message` packets.

use serde_json::Value;

use super::ProtocolVersion;
use crate::error::{Result, ServerError};

pub const DEFAULT_NAMESPACE: &str = "/";

/// Socket.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketKind {
    fn digit(&self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
        }
    }
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn new(kind: SocketPacketKind) -> Self {
        Self {
            kind,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// Connect acknowledgement; v4 carries the socket id
    pub fn connect_ack(version: ProtocolVersion, socket_id: &str) -> Self {
        let mut packet = Self::new(SocketPacketKind::Connect);
        if version == ProtocolVersion::V4 {
            packet.data = Some(serde_json::json!({ "sid": socket_id }));
        }
        packet
    }

    /// Refuse a namespace connect
    pub fn connect_error(version: ProtocolVersion, namespace: &str) -> Self {
        let mut packet = Self::new(SocketPacketKind::ConnectError);
        packet.namespace = namespace.to_string();
        packet.data = Some(match version {
            ProtocolVersion::V3 => Value::from("Invalid namespace"),
            ProtocolVersion::V4 => serde_json::json!({ "message": "Invalid namespace" }),
        });
        packet
    }

    /// `["name", payload]` event
    pub fn event(name: &str, payload: Value) -> Self {
        let mut packet = Self::new(SocketPacketKind::Event);
        packet.data = Some(Value::Array(vec![Value::from(name), payload]));
        packet
    }

    /// Acknowledge an event by id
    pub fn ack(namespace: &str, id: u64, args: Vec<Value>) -> Self {
        let mut packet = Self::new(SocketPacketKind::Ack);
        packet.namespace = namespace.to_string();
        packet.ack_id = Some(id);
        packet.data = Some(Value::Array(args));
        packet
    }

    pub fn is_default_namespace(&self) -> bool {
        self.namespace == DEFAULT_NAMESPACE
    }

    /// Event name, for `Event` packets
    pub fn event_name(&self) -> Option<&str> {
        match (&self.kind, &self.data) {
            (SocketPacketKind::Event, Some(Value::Array(items))) => {
                items.first().and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Event arguments after the name
    pub fn event_args(&self) -> &[Value] {
        match (&self.kind, &self.data) {
            (SocketPacketKind::Event, Some(Value::Array(items))) if !items.is_empty() => {
                &items[1..]
            }
            _ => &[],
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if !self.is_default_namespace() {
            out.push_str(&self.namespace);
            if self.ack_id.is_some() || self.data.is_some() {
                out.push(',');
            }
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = match chars.next() {
            Some('0') => SocketPacketKind::Connect,
            Some('1') => SocketPacketKind::Disconnect,
            Some('2') => SocketPacketKind::Event,
            Some('3') => SocketPacketKind::Ack,
            Some('4') => SocketPacketKind::ConnectError,
            Some('5') | Some('6') => return Err(ServerError::BinaryUnsupported),
            Some(other) => {
                return Err(ServerError::protocol(format!(
                    "unknown socket packet type '{other}'"
                )))
            }
            None => return Err(ServerError::protocol("empty socket packet")),
        };
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns
                }
                None => std::mem::take(&mut rest),
            }
        } else {
            DEFAULT_NAMESPACE
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ServerError::protocol(format!("bad ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        let packet = Self {
            kind,
            namespace: namespace.to_string(),
            ack_id,
            data,
        };

        if kind == SocketPacketKind::Event && packet.event_name().is_none() {
            return Err(ServerError::protocol(
                "event data must be an array starting with the event name",
            ));
        }

        Ok(packet)
    }
}
