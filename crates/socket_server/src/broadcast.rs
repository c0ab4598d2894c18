//! Outbound events to every connected client

use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::protocol::{EnginePacket, SocketPacket};
use crate::session::SessionRegistry;

/// Emits Socket.IO events on the default namespace
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Queue `42["event",payload]` for every connected session
    ///
    /// Returns the number of recipients.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> Result<usize> {
        let payload = serde_json::to_value(payload)?;
        let packet = EnginePacket::Message(SocketPacket::event(event, payload).encode());
        let recipients = self.registry.broadcast(&packet);
        trace!(event, recipients, "event broadcast");
        Ok(recipients)
    }

    /// Clients currently joined
    pub fn connected_count(&self) -> usize {
        self.registry.connected_count()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVersion;
    use crate::session::TransportKind;
    use contracts::SteerCommand;

    #[test]
    fn test_emit_encodes_steer_event() {
        let registry = Arc::new(SessionRegistry::new(8));
        let session = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        session.set_connected(true);

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let sent = broadcaster
            .emit("steer", &SteerCommand::new(-0.25, 0.2))
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(
            session.drain(),
            vec![EnginePacket::Message(
                r#"2["steer",{"steering_angle":"-0.25","throttle":"0.2"}]"#.into()
            )]
        );
    }

    #[test]
    fn test_emit_without_clients() {
        let broadcaster = Broadcaster::new(Arc::new(SessionRegistry::new(8)));
        assert_eq!(broadcaster.emit("manual", &serde_json::json!({})).unwrap(), 0);
    }
}
