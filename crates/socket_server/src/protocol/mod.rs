//! Wire codecs
//!
//! - `engine`: Engine.IO transport packets and polling payloads
//! - `socket`: Socket.IO packets inside Engine.IO messages

pub mod engine;
pub mod socket;

pub use engine::{
    decode_payload, encode_payload, EnginePacket, Handshake, PayloadEncoding, ProtocolVersion,
};
pub use socket::{SocketPacket, SocketPacketKind, DEFAULT_NAMESPACE};
