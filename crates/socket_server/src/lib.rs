//! # Socket Server
//!
//! Socket.IO server for the simulator link.
//!
//! Responsibilities:
//! - Engine.IO v3/v4 over long-polling and websocket
//! - Socket.IO default namespace: connect, `telemetry` in, events out
//! - Session registry with heartbeat and stale-session reaping
//! - Deliver `ServerEvent`s to the application through a bounded channel
//!
//! ## Usage Example
//!
//! ```ignore
//! let (server, mut events) = SocketServer::new(config.server.clone());
//! let broadcaster = server.broadcaster();
//! let handle = server.spawn(TcpListener::bind(addr).await?)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ServerEvent::Connected { .. } = event {
//!         broadcaster.emit("steer", &SteerCommand::neutral())?;
//!     }
//! }
//! handle.shutdown().await;
//! ```

mod broadcast;
mod error;
mod events;
pub mod metrics;
pub mod protocol;
mod server;
pub mod session;
mod transport;

pub use broadcast::Broadcaster;
pub use error::{Result, ServerError};
pub use events::{DisconnectReason, ServerEvent};
pub use server::{serve, ServerHandle, SocketServer};
pub use session::{Session, SessionRegistry, TransportKind};
