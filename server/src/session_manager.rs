//! Registry of live sessions.
//!
//! The [`SessionManager`] is the only state shared between connection tasks
//! and the broadcast loop, and it sits behind a single `RwLock`:
//! - accept allocates an id and registers the session
//! - receive and writer tasks remove their own session when the transport fails
//! - the broadcast loop reads intents and fans frames out, removing sessions
//!   whose writer has gone away
//!
//! Ids are handed out sequentially from zero and never reused while the
//! server runs. Removal is idempotent, so whichever task notices a dead
//! connection first wins and later attempts are no-ops.

use crate::session::{Delivery, Frame, Session};
use log::{debug, info, trace, warn};
use shared::Intent;
use std::collections::BTreeMap;

pub struct SessionManager {
    /// Live sessions indexed by id, iterated in ascending id order
    sessions: BTreeMap<u32, Session>,
    /// Next id to hand out
    next_session_id: u32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session_id: 0,
        }
    }

    /// Reserves the next session id. An id whose handshake fails is simply
    /// never registered; it is not handed out again.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    pub fn add_session(&mut self, session: Session) {
        info!("Session {} connected from {}", session.id, session.addr);
        self.sessions.insert(session.id, session);
    }

    /// Removes a session. Returns true only for the call that removed it.
    pub fn remove_session(&mut self, id: &u32) -> bool {
        if let Some(session) = self.sessions.remove(id) {
            info!(
                "Session {} disconnected after {:.1}s",
                session.id,
                session.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &u32) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    /// Snapshot of every live session's latest intent.
    pub fn latest_intents(&self) -> BTreeMap<u32, Intent> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.latest_intent()))
            .collect()
    }

    /// Offers `frame` to every live session and returns the ids whose writer
    /// has stopped. Full queues drop the frame for that session only.
    ///
    /// A congested session is warned about once when it starts dropping and
    /// reported again when it catches up.
    pub fn broadcast(&self, frame: &Frame) -> Vec<u32> {
        let mut closed = Vec::new();

        for (id, session) in &self.sessions {
            let streak = session.dropped_streak();

            match session.offer(Frame::clone(frame)) {
                Delivery::Queued if streak > 0 => {
                    debug!("Session {} caught up after {} dropped frames", id, streak);
                }
                Delivery::Queued => {}
                Delivery::Dropped if streak == 0 => {
                    warn!("Session {} is congested, dropping frames", id);
                }
                Delivery::Dropped => trace!("Session {} dropped frame {}", id, streak + 1),
                Delivery::Closed => closed.push(*id),
            }
        }

        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionIo;
    use std::net::SocketAddr;
    use std::sync::Arc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8888".parse().unwrap()
    }

    fn register(manager: &mut SessionManager, queue_len: usize) -> (u32, SessionIo) {
        let id = manager.allocate_id();
        let (session, io) = Session::channel(id, test_addr(), queue_len);
        manager.add_session(session);
        (id, io)
    }

    #[test]
    fn test_manager_creation() {
        let manager = SessionManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_ids_are_sequential_from_zero() {
        let mut manager = SessionManager::new();
        let (first, _io1) = register(&mut manager, 4);
        let (second, _io2) = register(&mut manager, 4);

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(manager.ids(), vec![0, 1]);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut manager = SessionManager::new();
        let (first, _io1) = register(&mut manager, 4);
        assert!(manager.remove_session(&first));

        let (second, _io2) = register(&mut manager, 4);
        assert_eq!(second, 1);
        assert!(!manager.contains(&first));
    }

    #[test]
    fn test_remove_session_is_idempotent() {
        let mut manager = SessionManager::new();
        let (id, _io) = register(&mut manager, 4);

        assert!(manager.remove_session(&id));
        assert!(!manager.remove_session(&id));
        assert!(!manager.remove_session(&999));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_latest_intents_per_session() {
        let mut manager = SessionManager::new();
        let (first, io1) = register(&mut manager, 4);
        let (second, _io2) = register(&mut manager, 4);

        io1.intent_tx.send(Intent::new(0, -1, true)).unwrap();

        let intents = manager.latest_intents();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[&first], Intent::new(0, -1, true));
        assert_eq!(intents[&second], Intent::idle());
    }

    #[test]
    fn test_broadcast_reaches_every_session() {
        let mut manager = SessionManager::new();
        let (_, mut io1) = register(&mut manager, 4);
        let (_, mut io2) = register(&mut manager, 4);

        let frame: Frame = Arc::from("0,1,2:\n");
        assert!(manager.broadcast(&frame).is_empty());

        assert_eq!(io1.outbound_rx.try_recv().unwrap().as_ref(), "0,1,2:\n");
        assert_eq!(io2.outbound_rx.try_recv().unwrap().as_ref(), "0,1,2:\n");
    }

    #[test]
    fn test_broadcast_reports_closed_sessions_only() {
        let mut manager = SessionManager::new();
        let (alive, mut alive_io) = register(&mut manager, 1);
        let (dead, dead_io) = register(&mut manager, 1);
        let (_congested, _congested_io) = register(&mut manager, 1);
        drop(dead_io);

        let frame: Frame = Arc::from(":\n");
        assert_eq!(manager.broadcast(&frame), vec![dead]);

        // The congested session drops the second frame but stays registered.
        alive_io.outbound_rx.try_recv().unwrap();
        let closed = manager.broadcast(&frame);
        assert_eq!(closed, vec![dead]);
        assert!(manager.contains(&alive));
    }

    #[test]
    fn test_broadcast_tracks_congestion_per_session() {
        let mut manager = SessionManager::new();
        let (congested, mut congested_io) = register(&mut manager, 1);
        let (draining, mut draining_io) = register(&mut manager, 1);

        let frame: Frame = Arc::from(":\n");
        for _ in 0..4 {
            assert!(manager.broadcast(&frame).is_empty());
            draining_io.outbound_rx.try_recv().unwrap();
        }

        let session = |id: u32| manager.sessions.get(&id).unwrap();
        assert_eq!(session(congested).dropped_streak(), 3);
        assert_eq!(session(draining).dropped_streak(), 0);

        congested_io.outbound_rx.try_recv().unwrap();
        manager.broadcast(&frame);
        assert_eq!(session(congested).dropped_streak(), 0);
        assert!(manager.contains(&congested));
    }
}
