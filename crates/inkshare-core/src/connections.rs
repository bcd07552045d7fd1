//! Per-connection outboxes and fan-out primitives.
//!
//! Every connection owns a bounded queue drained by its transport task.
//! Sends never wait. When a queue is full, live relays (stroke points,
//! cursors) are dropped for that peer only. Any other message that cannot be
//! queued evicts the peer: its outbox is removed so the transport closes,
//! and the peer resyncs from `init_state` when it reconnects.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::participants::ParticipantId;
use crate::protocol::ServerMessage;

/// Messages are shared between recipients rather than cloned per peer.
pub type Outgoing = Arc<ServerMessage>;

/// Sending half of a connection's outbox.
pub type Outbox = mpsc::Sender<Outgoing>;

/// Receiving half of a connection's outbox.
pub type OutboxReceiver = mpsc::Receiver<Outgoing>;

/// Default number of messages buffered per connection.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Create a connection outbox.
pub fn outbox(capacity: usize) -> (Outbox, OutboxReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Delivery primitives the coordinator fans events out through.
pub trait Broadcast {
    /// Deliver to one connection. Returns whether it was enqueued.
    fn send_to(&mut self, id: &ParticipantId, msg: ServerMessage) -> bool;

    /// Deliver to every connection. Returns the number of recipients.
    fn broadcast_all(&mut self, msg: ServerMessage) -> usize;

    /// Deliver to every connection but `sender`. Returns the number of recipients.
    fn broadcast_excluding(&mut self, sender: &ParticipantId, msg: ServerMessage) -> usize;
}

/// Result of a single enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    Dropped,
    Evict,
}

/// The set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    outboxes: HashMap<ParticipantId, Outbox>,
    /// Peers removed because they could not keep up, in eviction order.
    evicted: Vec<ParticipantId>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ParticipantId, outbox: Outbox) {
        self.outboxes.insert(id, outbox);
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Outbox> {
        self.outboxes.remove(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.outboxes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Take the peers evicted since the last call.
    pub fn take_evicted(&mut self) -> Vec<ParticipantId> {
        std::mem::take(&mut self.evicted)
    }

    fn deliver(id: &ParticipantId, outbox: &Outbox, msg: &Outgoing) -> Delivery {
        match outbox.try_send(Arc::clone(msg)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) if msg.is_ephemeral() => {
                log::debug!("Outbox full for {}, dropping {}", id, msg.kind());
                Delivery::Dropped
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Outbox full for {} on {}, evicting", id, msg.kind());
                Delivery::Evict
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Outbox closed for {}, evicting", id);
                Delivery::Evict
            }
        }
    }

    /// Enqueue `msg` for every recipient, evicting those that cannot take it.
    fn fan_out(&mut self, msg: ServerMessage, skip: Option<&ParticipantId>) -> usize {
        let msg = Arc::new(msg);
        let mut queued = 0;
        let mut evict = Vec::new();
        for (id, outbox) in &self.outboxes {
            if skip == Some(id) {
                continue;
            }
            match Self::deliver(id, outbox, &msg) {
                Delivery::Queued => queued += 1,
                Delivery::Dropped => {}
                Delivery::Evict => evict.push(*id),
            }
        }
        for id in evict {
            self.outboxes.remove(&id);
            self.evicted.push(id);
        }
        queued
    }
}

impl Broadcast for ConnectionSet {
    fn send_to(&mut self, id: &ParticipantId, msg: ServerMessage) -> bool {
        let Some(outbox) = self.outboxes.get(id) else {
            return false;
        };
        match Self::deliver(id, outbox, &Arc::new(msg)) {
            Delivery::Queued => true,
            Delivery::Dropped => false,
            Delivery::Evict => {
                self.outboxes.remove(id);
                self.evicted.push(*id);
                false
            }
        }
    }

    fn broadcast_all(&mut self, msg: ServerMessage) -> usize {
        self.fan_out(msg, None)
    }

    fn broadcast_excluding(&mut self, sender: &ParticipantId, msg: ServerMessage) -> usize {
        self.fan_out(msg, Some(sender))
    }
}
