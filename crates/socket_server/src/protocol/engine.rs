//! Engine.IO packets and polling payloads
//!
//! Packet: one type digit followed by string data.
//!
//! Payload (several packets in one polling body):
//! - v4: packets joined with the record separator `\x1e`
//! - v3 text (`b64=1`): `<len>:<packet>` repeated, length in UTF-16 units
//! - v3 binary: `0x00 <len digits as bytes> 0xFF <packet>` repeated

use serde::Serialize;

use crate::error::{Result, ServerError};

/// Separator between packets in a v4 payload
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Engine.IO protocol revision, from the `EIO` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V3,
    V4,
}

impl ProtocolVersion {
    pub fn from_query(value: Option<&str>) -> Result<Self> {
        match value {
            Some("3") => Ok(Self::V3),
            Some("4") => Ok(Self::V4),
            other => Err(ServerError::UnsupportedVersion(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V3 => "3",
            Self::V4 => "4",
        }
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// Handshake, JSON data
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    /// Socket.IO packet text
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    fn type_digit(&self) -> char {
        match self {
            Self::Open(_) => '0',
            Self::Close => '1',
            Self::Ping(_) => '2',
            Self::Pong(_) => '3',
            Self::Message(_) => '4',
            Self::Upgrade => '5',
            Self::Noop => '6',
        }
    }

    fn data(&self) -> &str {
        match self {
            Self::Open(data) | Self::Ping(data) | Self::Pong(data) | Self::Message(data) => data,
            Self::Close | Self::Upgrade | Self::Noop => "",
        }
    }

    pub fn encode(&self) -> String {
        let data = self.data();
        let mut out = String::with_capacity(1 + data.len());
        out.push(self.type_digit());
        out.push_str(data);
        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ServerError::protocol("empty packet"))?;
        let data = chars.as_str().to_string();

        match kind {
            '0' => Ok(Self::Open(data)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(data)),
            '3' => Ok(Self::Pong(data)),
            '4' => Ok(Self::Message(data)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            'b' => Err(ServerError::BinaryUnsupported),
            other => Err(ServerError::protocol(format!(
                "unknown packet type '{other}'"
            ))),
        }
    }
}

/// Data of the `Open` packet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    /// v4 only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    pub fn into_packet(self) -> Result<EnginePacket> {
        Ok(EnginePacket::Open(serde_json::to_string(&self)?))
    }
}

/// How a polling response body is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// v4, record separated
    Separated,
    /// v3 with `b64=1`
    LengthPrefixed,
    /// v3 default
    Binary,
}

impl PayloadEncoding {
    pub fn for_request(version: ProtocolVersion, b64: bool) -> Self {
        match (version, b64) {
            (ProtocolVersion::V4, _) => Self::Separated,
            (ProtocolVersion::V3, true) => Self::LengthPrefixed,
            (ProtocolVersion::V3, false) => Self::Binary,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Separated | Self::LengthPrefixed => "text/plain; charset=UTF-8",
            Self::Binary => "application/octet-stream",
        }
    }
}

/// Frame packets into one polling response body
pub fn encode_payload(packets: &[EnginePacket], encoding: PayloadEncoding) -> Vec<u8> {
    match encoding {
        PayloadEncoding::Separated => packets
            .iter()
            .map(EnginePacket::encode)
            .collect::<Vec<_>>()
            .join(&RECORD_SEPARATOR.to_string())
            .into_bytes(),
        PayloadEncoding::LengthPrefixed => {
            let mut out = String::new();
            for packet in packets {
                let encoded = packet.encode();
                out.push_str(&encoded.encode_utf16().count().to_string());
                out.push(':');
                out.push_str(&encoded);
            }
            out.into_bytes()
        }
        PayloadEncoding::Binary => {
            let mut out = Vec::new();
            for packet in packets {
                let encoded = packet.encode();
                out.push(0x00);
                out.extend(encoded.len().to_string().bytes().map(|d| d - b'0'));
                out.push(0xFF);
                out.extend_from_slice(encoded.as_bytes());
            }
            out
        }
    }
}

/// Split a polling request body into packets
///
/// v3 bodies may use either framing; a leading `0x00`/`0x01` byte selects
/// the binary one.
pub fn decode_payload(body: &[u8], version: ProtocolVersion) -> Result<Vec<EnginePacket>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    match version {
        ProtocolVersion::V4 => utf8(body)?
            .split(RECORD_SEPARATOR)
            .map(EnginePacket::decode)
            .collect(),
        ProtocolVersion::V3 if matches!(body[0], 0x00 | 0x01) => decode_binary(body),
        ProtocolVersion::V3 => decode_length_prefixed(utf8(body)?),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| ServerError::protocol(format!("payload is not UTF-8: {e}")))
}

fn decode_length_prefixed(mut rest: &str) -> Result<Vec<EnginePacket>> {
    let mut packets = Vec::new();

    while !rest.is_empty() {
        let colon = rest
            .find(':')
            .ok_or_else(|| ServerError::protocol("missing length prefix"))?;
        let len: usize = rest[..colon]
            .parse()
            .map_err(|_| ServerError::protocol(format!("bad length '{}'", &rest[..colon])))?;
        rest = &rest[colon + 1..];

        // Walk `len` UTF-16 units forward to find the byte boundary
        let mut units = 0;
        let mut end = rest.len();
        for (idx, ch) in rest.char_indices() {
            if units == len {
                end = idx;
                break;
            }
            units += ch.len_utf16();
        }
        if units != len {
            return Err(ServerError::protocol("packet shorter than its length prefix"));
        }

        packets.push(EnginePacket::decode(&rest[..end])?);
        rest = &rest[end..];
    }

    Ok(packets)
}

fn decode_binary(body: &[u8]) -> Result<Vec<EnginePacket>> {
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            0x00 => {}
            0x01 => return Err(ServerError::BinaryUnsupported),
            other => {
                return Err(ServerError::protocol(format!(
                    "bad payload marker 0x{other:02x}"
                )))
            }
        }
        pos += 1;

        let mut len: usize = 0;
        let mut digits = 0;
        loop {
            let byte = *body
                .get(pos)
                .ok_or_else(|| ServerError::protocol("truncated length"))?;
            pos += 1;
            if byte == 0xFF {
                break;
            }
            if byte > 9 || digits >= 10 {
                return Err(ServerError::protocol("bad length digit"));
            }
            len = len * 10 + usize::from(byte);
            digits += 1;
        }

        let packet = body
            .get(pos..pos + len)
            .ok_or_else(|| ServerError::protocol("packet shorter than its length prefix"))?;
        packets.push(EnginePacket::decode(utf8(packet)?)?);
        pos += len;
    }

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_decode() {
        assert_eq!(
            EnginePacket::decode("2probe").unwrap(),
            EnginePacket::Ping("probe".into())
        );
        assert_eq!(
            EnginePacket::decode("40").unwrap(),
            EnginePacket::Message("0".into())
        );
        assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
    }

    #[test]
    fn test_packet_decode_errors() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(matches!(
            EnginePacket::decode("b4AAEC"),
            Err(ServerError::BinaryUnsupported)
        ));
    }

    #[test]
    fn test_packet_encode() {
        assert_eq!(EnginePacket::Pong("probe".into()).encode(), "3probe");
        assert_eq!(EnginePacket::Upgrade.encode(), "5");
        assert_eq!(EnginePacket::Ping(String::new()).encode(), "2");
    }

    #[test]
    fn test_handshake_fields() {
        let open = Handshake {
            sid: "abc".into(),
            upgrades: vec!["websocket".into()],
            ping_interval: 25000,
            ping_timeout: 20000,
            max_payload: None,
        }
        .into_packet()
        .unwrap();
        assert_eq!(
            open.encode(),
            r#"0{"sid":"abc","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000}"#
        );
    }

    #[test]
    fn test_version_from_query() {
        assert_eq!(
            ProtocolVersion::from_query(Some("3")).unwrap(),
            ProtocolVersion::V3
        );
        assert_eq!(
            ProtocolVersion::from_query(Some("4")).unwrap(),
            ProtocolVersion::V4
        );
        assert!(ProtocolVersion::from_query(Some("2")).is_err());
        assert!(ProtocolVersion::from_query(None).is_err());
    }

    #[test]
    fn test_v4_payload() {
        let packets = vec![
            EnginePacket::Message(r#"2["a"]"#.into()),
            EnginePacket::Ping(String::new()),
        ];
        let body = encode_payload(&packets, PayloadEncoding::Separated);
        assert_eq!(body, b"42[\"a\"]\x1e2");
        assert_eq!(decode_payload(&body, ProtocolVersion::V4).unwrap(), packets);
    }

    #[test]
    fn test_v3_length_prefixed_payload() {
        let packets = vec![EnginePacket::Message("0".into()), EnginePacket::Noop];
        let body = encode_payload(&packets, PayloadEncoding::LengthPrefixed);
        assert_eq!(body, b"2:401:6");
        assert_eq!(decode_payload(&body, ProtocolVersion::V3).unwrap(), packets);
    }

    #[test]
    fn test_v3_length_counts_utf16_units() {
        let packets = vec![EnginePacket::Message("é".into()), EnginePacket::Noop];
        let body = encode_payload(&packets, PayloadEncoding::LengthPrefixed);
        assert_eq!(std::str::from_utf8(&body).unwrap(), "2:4é1:6");
        assert_eq!(decode_payload(&body, ProtocolVersion::V3).unwrap(), packets);
    }

    #[test]
    fn test_v3_binary_payload() {
        let body = encode_payload(
            &[EnginePacket::Message("0".into())],
            PayloadEncoding::Binary,
        );
        assert_eq!(body, vec![0x00, 2, 0xFF, b'4', b'0']);

        // 12-byte packet: length digits 1, 2
        let long = EnginePacket::Message("2[\"steers\"]".into());
        assert_eq!(long.encode().len(), 12);
        let body = encode_payload(&[long.clone()], PayloadEncoding::Binary);
        assert_eq!(&body[..4], &[0x00, 1, 2, 0xFF]);
        assert_eq!(
            decode_payload(&body, ProtocolVersion::V3).unwrap(),
            vec![long]
        );
    }

    #[test]
    fn test_v3_payload_errors() {
        assert!(decode_payload(b"5:40", ProtocolVersion::V3).is_err());
        assert!(decode_payload(b"x:40", ProtocolVersion::V3).is_err());
        assert!(decode_payload(&[0x00, 5, 0xFF, b'4'], ProtocolVersion::V3).is_err());
        assert!(matches!(
            decode_payload(&[0x01, 1, 0xFF, 4], ProtocolVersion::V3),
            Err(ServerError::BinaryUnsupported)
        ));
    }

    #[test]
    fn test_empty_body_is_no_packets() {
        assert!(decode_payload(b"", ProtocolVersion::V4).unwrap().is_empty());
    }
}
