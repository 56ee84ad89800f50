//! One accepted connection as seen by the broadcast loop.

use shared::Intent;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// An encoded broadcast line shared by every session it is sent to.
pub type Frame = Arc<str>;

/// Result of offering a frame to a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue was full and the frame was dropped for this session only.
    Dropped,
    /// The writer task is gone; the session must be torn down.
    Closed,
}

/// Registry-side half of a session.
///
/// Holds the read end of the intent slot and the send end of the outbound
/// queue. Dropping it makes both connection tasks of the session wind down.
#[derive(Debug)]
pub struct Session {
    pub id: u32,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    intent: watch::Receiver<Intent>,
    outbound: mpsc::Sender<Frame>,
    /// Frames dropped in a row since the last one that was queued
    dropped_streak: AtomicU32,
}

/// Connection-side half of a session, owned by its receive and writer tasks.
#[derive(Debug)]
pub struct SessionIo {
    /// Written by the receive loop only.
    pub intent_tx: watch::Sender<Intent>,
    /// Drained by the writer task only.
    pub outbound_rx: mpsc::Receiver<Frame>,
}

impl Session {
    /// Creates both halves of a session with an idle intent and an outbound
    /// queue of `queue_len` frames.
    pub fn channel(id: u32, addr: SocketAddr, queue_len: usize) -> (Session, SessionIo) {
        let (intent_tx, intent_rx) = watch::channel(Intent::idle());
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_len.max(1));

        let session = Session {
            id,
            addr,
            connected_at: Instant::now(),
            intent: intent_rx,
            outbound: outbound_tx,
            dropped_streak: AtomicU32::new(0),
        };

        (
            session,
            SessionIo {
                intent_tx,
                outbound_rx,
            },
        )
    }

    /// The most recently decoded intent, idle until the first one arrives.
    pub fn latest_intent(&self) -> Intent {
        *self.intent.borrow()
    }

    /// Queues a frame without waiting, so a congested session never holds up
    /// the tick for everyone else.
    pub fn offer(&self, frame: Frame) -> Delivery {
        match self.outbound.try_send(frame) {
            Ok(()) => {
                self.dropped_streak.store(0, Ordering::Relaxed);
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_streak.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Number of consecutive frames dropped for this session. Resets to zero
    /// once a frame is queued again.
    pub fn dropped_streak(&self) -> u32 {
        self.dropped_streak.load(Ordering::Relaxed)
    }
}
