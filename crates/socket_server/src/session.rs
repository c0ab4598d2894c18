//! Engine.IO sessions
//!
//! One `Session` per Engine.IO sid. Outbound packets wait in a bounded
//! queue until a poll request or the websocket writer drains them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::protocol::{EnginePacket, ProtocolVersion};

/// Transport a session was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Polling,
    WebSocket,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::WebSocket => "websocket",
        }
    }
}

/// One Engine.IO session
#[derive(Debug)]
pub struct Session {
    sid: String,
    socket_id: String,
    version: ProtocolVersion,
    opened_on: TransportKind,
    created: Instant,
    last_seen_ms: AtomicU64,
    connected: AtomicBool,
    upgraded: AtomicBool,
    polling: AtomicBool,
    closed: AtomicBool,
    queue: Mutex<VecDeque<EnginePacket>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
}

impl Session {
    fn new(version: ProtocolVersion, opened_on: TransportKind, capacity: usize) -> Self {
        Self {
            sid: new_id(),
            socket_id: new_id(),
            version,
            opened_on,
            created: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            upgraded: AtomicBool::new(opened_on == TransportKind::WebSocket),
            polling: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Engine.IO session id
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Socket.IO socket id (v4 connect acknowledgement)
    pub fn socket_id(&self) -> &str {
        &self.socket_id
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn opened_on(&self) -> TransportKind {
        self.opened_on
    }

    /// Current transport
    pub fn transport(&self) -> TransportKind {
        if self.is_upgraded() {
            TransportKind::WebSocket
        } else {
            TransportKind::Polling
        }
    }

    /// Joined the default Socket.IO namespace
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Set the namespace flag, returning the previous value
    pub fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::SeqCst)
    }

    pub fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::SeqCst)
    }

    pub fn set_upgraded(&self) {
        self.upgraded.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark closed and wake whoever is waiting on the queue
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Record client activity
    pub fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_seen_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last client activity
    pub fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last_seen)
    }

    /// Claim the single long-poll slot
    pub fn try_begin_poll(&self) -> bool {
        !self.polling.swap(true, Ordering::SeqCst)
    }

    pub fn end_poll(&self) {
        self.polling.store(false, Ordering::SeqCst);
    }

    /// Queue a packet for delivery
    ///
    /// When the queue is full the oldest packet is dropped. Returns `false`
    /// if that happened.
    pub fn push(&self, packet: EnginePacket) -> bool {
        let mut queue = self.queue();
        let mut kept_all = true;
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            kept_all = false;
        }
        queue.push_back(packet);
        drop(queue);

        self.notify.notify_one();
        kept_all
    }

    /// Take every queued packet
    pub fn drain(&self) -> Vec<EnginePacket> {
        self.queue().drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.queue().len()
    }

    /// Packets dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Resolves after the next `push` or `close`
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<EnginePacket>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Live sessions by sid
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            queue_capacity,
        }
    }

    /// Open a new session
    pub fn create(&self, version: ProtocolVersion, transport: TransportKind) -> Arc<Session> {
        let session = Arc::new(Session::new(version, transport, self.queue_capacity));
        session.touch();
        self.sessions
            .insert(session.sid().to_string(), Arc::clone(&session));
        session
    }

    pub fn get(&self, sid: &str) -> Option<Arc<Session>> {
        self.sessions.get(sid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, sid: &str) -> Option<Arc<Session>> {
        self.sessions.remove(sid).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions joined to the default namespace
    pub fn connected_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.is_connected() && !entry.is_closed())
            .count()
    }

    /// Queue a packet on every connected session, returning the recipient count
    pub fn broadcast(&self, packet: &EnginePacket) -> usize {
        let mut recipients = 0;
        for entry in self.sessions.iter() {
            if entry.is_connected() && !entry.is_closed() {
                entry.push(packet.clone());
                recipients += 1;
            }
        }
        recipients
    }

    /// Sids idle for longer than `max_idle`
    pub fn stale(&self, max_idle: Duration) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.idle_for() > max_idle)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Sids of every session
    pub fn sids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let registry = SessionRegistry::new(2);
        let session = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        assert!(session.push(EnginePacket::Message("2[\"a\"]".into())));
        assert!(session.push(EnginePacket::Message("2[\"b\"]".into())));
        assert!(!session.push(EnginePacket::Message("2[\"c\"]".into())));
        assert_eq!(session.dropped(), 1);
        assert_eq!(
            session.drain(),
            vec![
                EnginePacket::Message("2[\"b\"]".into()),
                EnginePacket::Message("2[\"c\"]".into()),
            ]
        );
        assert_eq!(session.queued(), 0);
    }

    #[test]
    fn test_broadcast_only_reaches_connected_sessions() {
        let registry = SessionRegistry::new(8);
        let a = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        let b = registry.create(ProtocolVersion::V3, TransportKind::WebSocket);
        let _c = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        a.set_connected(true);
        b.set_connected(true);

        let sent = registry.broadcast(&EnginePacket::Noop);
        assert_eq!(sent, 2);
        assert_eq!(registry.connected_count(), 2);
        assert_eq!(a.queued(), 1);
        assert_eq!(b.queued(), 1);
    }

    #[test]
    fn test_websocket_sessions_start_upgraded() {
        let registry = SessionRegistry::new(8);
        let ws = registry.create(ProtocolVersion::V4, TransportKind::WebSocket);
        let poll = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        assert_eq!(ws.transport(), TransportKind::WebSocket);
        assert_eq!(poll.transport(), TransportKind::Polling);
        poll.set_upgraded();
        assert_eq!(poll.transport(), TransportKind::WebSocket);
        assert_eq!(poll.opened_on(), TransportKind::Polling);
    }

    #[test]
    fn test_single_poll_slot() {
        let registry = SessionRegistry::new(8);
        let session = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        assert!(session.try_begin_poll());
        assert!(!session.try_begin_poll());
        session.end_poll();
        assert!(session.try_begin_poll());
    }

    #[test]
    fn test_lookup_and_remove() {
        let registry = SessionRegistry::new(8);
        let session = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        let sid = session.sid().to_string();
        assert!(registry.get(&sid).is_some());
        assert!(registry.remove(&sid).is_some());
        assert!(registry.get(&sid).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fresh_session_is_not_stale() {
        let registry = SessionRegistry::new(8);
        registry.create(ProtocolVersion::V4, TransportKind::Polling);
        assert!(registry.stale(Duration::from_secs(60)).is_empty());
    }

    #[tokio::test]
    async fn test_push_wakes_waiter() {
        let registry = SessionRegistry::new(8);
        let session = registry.create(ProtocolVersion::V4, TransportKind::Polling);
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session.notified().await;
                session.drain()
            })
        };
        tokio::task::yield_now().await;
        session.push(EnginePacket::Noop);
        let drained = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(drained, vec![EnginePacket::Noop]);
    }
}
