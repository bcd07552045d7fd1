//! Protocol state machine shared by every connection.
//!
//! The coordinator owns the operation log, the roster and the connection
//! set. Each event is handled to completion, mutation and fan-out together,
//! before the next one is accepted; callers must serialize access (the server
//! runs it inside a single task).

use std::collections::HashMap;

use serde::Serialize;

use crate::connections::{Broadcast, ConnectionSet, Outbox};
use crate::operation_log::{Operation, OperationLog};
use crate::participants::{Participant, ParticipantId, ParticipantRegistry, random_color};
use crate::protocol::{ClientMessage, CursorPosition, ServerMessage};
use crate::stroke::{Point, Stroke};

/// Every event a coordinator must handle.
pub trait SessionHandler {
    /// A connection opened. Returns the registered participant.
    fn on_connect(&mut self, id: ParticipantId, outbox: Outbox) -> Participant;

    fn on_start_stroke(&mut self, from: ParticipantId, point: Point);

    fn on_draw_point(&mut self, from: ParticipantId, point: Point);

    /// Commit a finished stroke. Returns the new operation, or `None` if rejected.
    fn on_end_stroke(&mut self, from: ParticipantId, stroke: Stroke) -> Option<Operation>;

    fn on_cursor_move(&mut self, from: ParticipantId, position: CursorPosition);

    /// Returns the operation that was undone, if any.
    fn on_undo(&mut self, from: ParticipantId) -> Option<Operation>;

    /// Returns the operation that was redone, if any.
    fn on_redo(&mut self, from: ParticipantId) -> Option<Operation>;

    /// A connection closed.
    fn on_disconnect(&mut self, id: ParticipantId);

    /// Route a decoded client message to its handler.
    fn dispatch(&mut self, from: ParticipantId, msg: ClientMessage) {
        match msg {
            ClientMessage::StartStroke(point) => self.on_start_stroke(from, point),
            ClientMessage::DrawPoint(point) => self.on_draw_point(from, point),
            ClientMessage::EndStroke { stroke } => {
                self.on_end_stroke(from, stroke);
            }
            ClientMessage::CursorMove(position) => self.on_cursor_move(from, position),
            ClientMessage::Undo => {
                self.on_undo(from);
            }
            ClientMessage::Redo => {
                self.on_redo(from);
            }
        }
    }
}

/// Live, never-logged state of one participant.
#[derive(Debug, Default)]
struct Ephemeral {
    /// Points relayed since the last `start_stroke`, if a stroke is open.
    in_progress: Option<Vec<Point>>,
    cursor: Option<CursorPosition>,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorStats {
    pub participants: usize,
    pub operations: usize,
    pub redo_depth: usize,
}

/// The authoritative document plus everyone connected to it.
#[derive(Debug, Default)]
pub struct SyncCoordinator {
    log: OperationLog,
    registry: ParticipantRegistry,
    connections: ConnectionSet,
    ephemeral: HashMap<ParticipantId, Ephemeral>,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            participants: self.registry.count(),
            operations: self.log.len(),
            redo_depth: self.log.redo_len(),
        }
    }

    /// Whether the participant has a stroke that has started but not ended.
    pub fn has_stroke_in_progress(&self, id: &ParticipantId) -> bool {
        self.ephemeral
            .get(id)
            .is_some_and(|state| state.in_progress.is_some())
    }

    /// Last cursor position received from the participant.
    pub fn cursor(&self, id: &ParticipantId) -> Option<CursorPosition> {
        self.ephemeral.get(id).and_then(|state| state.cursor)
    }

    /// Clear the document and tell everyone.
    ///
    /// Not reachable from the client protocol.
    pub fn reset(&mut self) {
        self.log.reset();
        for state in self.ephemeral.values_mut() {
            state.in_progress = None;
        }
        self.connections.broadcast_all(ServerMessage::RemoteUndo {
            operations: self.log.snapshot(),
        });
        log::info!("Document reset");
        self.evict_stalled();
    }

    /// Look up the sender's state, ignoring messages from unknown connections.
    fn sender_state(&mut self, from: &ParticipantId) -> Option<&mut Ephemeral> {
        let state = self.ephemeral.get_mut(from);
        if state.is_none() {
            log::warn!("Ignoring message from unknown participant {}", from);
        }
        state
    }

    /// Drop participants whose outbox could not take a document event.
    ///
    /// Their transport sees the outbox close and hangs up; the rest of the
    /// room is told they left. Removal itself can overflow further outboxes,
    /// so this repeats until nothing more is evicted.
    fn evict_stalled(&mut self) {
        loop {
            let evicted = self.connections.take_evicted();
            if evicted.is_empty() {
                return;
            }
            for id in evicted {
                log::warn!("Evicting participant {}: outbox unavailable", id);
                self.remove_participant(id);
            }
        }
    }

    /// Forget a participant and announce the departure.
    fn remove_participant(&mut self, id: ParticipantId) {
        self.connections.remove(&id);
        let ephemeral = self.ephemeral.remove(&id);
        if self.registry.remove(&id).is_none() {
            return;
        }

        if ephemeral.is_some_and(|state| state.in_progress.is_some()) {
            self.connections.broadcast_all(ServerMessage::RemoteStrokeAbandoned { user_id: id });
        }
        self.connections.broadcast_all(ServerMessage::UserList {
            users: self.registry.list(),
        });
        self.connections.broadcast_all(ServerMessage::UserLeft { user_id: id });

        log::info!(
            "Participant {} left ({} connected)",
            id,
            self.registry.count()
        );
    }

    fn valid_point(from: &ParticipantId, point: &Point) -> bool {
        match point.validate() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping point from {}: {}", from, e);
                false
            }
        }
    }
}

impl SessionHandler for SyncCoordinator {
    fn on_connect(&mut self, id: ParticipantId, outbox: Outbox) -> Participant {
        let participant = self.registry.add(id, random_color()).clone();
        self.connections.insert(id, outbox);
        self.ephemeral.insert(id, Ephemeral::default());

        // The snapshot must be the first thing this connection sees.
        self.connections.send_to(
            &id,
            ServerMessage::InitState {
                operations: self.log.snapshot(),
                users: self.registry.list(),
            },
        );
        self.connections.broadcast_all(ServerMessage::UserList {
            users: self.registry.list(),
        });
        self.connections.broadcast_excluding(
            &id,
            ServerMessage::UserJoined {
                user_id: id,
                color: participant.color.clone(),
            },
        );

        log::info!(
            "Participant {} joined ({} connected)",
            id,
            self.registry.count()
        );
        self.evict_stalled();
        participant
    }

    fn on_start_stroke(&mut self, from: ParticipantId, point: Point) {
        if !Self::valid_point(&from, &point) {
            return;
        }
        let Some(state) = self.sender_state(&from) else {
            return;
        };
        state.in_progress = Some(vec![point.clone()]);

        self.connections.broadcast_excluding(
            &from,
            ServerMessage::RemoteStrokeStart {
                user_id: from,
                point,
            },
        );
        self.evict_stalled();
    }

    fn on_draw_point(&mut self, from: ParticipantId, point: Point) {
        if !Self::valid_point(&from, &point) {
            return;
        }
        let Some(state) = self.sender_state(&from) else {
            return;
        };
        state
            .in_progress
            .get_or_insert_with(Vec::new)
            .push(point.clone());

        self.connections.broadcast_excluding(
            &from,
            ServerMessage::RemoteDrawPoint {
                user_id: from,
                point,
            },
        );
        self.evict_stalled();
    }

    fn on_end_stroke(&mut self, from: ParticipantId, stroke: Stroke) -> Option<Operation> {
        let state = self.sender_state(&from)?;
        let was_open = state.in_progress.take().is_some();

        let operation = match self.log.commit(stroke, from) {
            Ok(operation) => operation,
            Err(e) => {
                log::warn!("Rejected stroke from {}: {}", from, e);
                // Others are still showing the relayed points.
                if was_open {
                    self.connections.broadcast_excluding(
                        &from,
                        ServerMessage::RemoteStrokeAbandoned { user_id: from },
                    );
                    self.evict_stalled();
                }
                return None;
            }
        };

        self.connections.broadcast_excluding(
            &from,
            ServerMessage::RemoteStrokeEnd {
                id: operation.id,
                stroke: operation.stroke.clone(),
                user_id: from,
            },
        );
        log::debug!(
            "Committed operation {} from {} ({} points)",
            operation.id,
            from,
            operation.stroke.len()
        );
        self.evict_stalled();
        Some(operation)
    }

    fn on_cursor_move(&mut self, from: ParticipantId, position: CursorPosition) {
        if !position.is_finite() {
            log::warn!("Dropping non-finite cursor from {}", from);
            return;
        }
        let Some(state) = self.sender_state(&from) else {
            return;
        };
        state.cursor = Some(position);

        let Some(color) = self.registry.get(&from).map(|p| p.color.clone()) else {
            return;
        };
        self.connections.broadcast_excluding(
            &from,
            ServerMessage::RemoteCursorMove {
                user_id: from,
                position,
                color,
            },
        );
        self.evict_stalled();
    }

    fn on_undo(&mut self, from: ParticipantId) -> Option<Operation> {
        self.sender_state(&from)?;
        let operation = self.log.undo()?;

        self.connections.broadcast_all(ServerMessage::RemoteUndo {
            operations: self.log.snapshot(),
        });
        log::debug!("Participant {} undid operation {}", from, operation.id);
        self.evict_stalled();
        Some(operation)
    }

    fn on_redo(&mut self, from: ParticipantId) -> Option<Operation> {
        self.sender_state(&from)?;
        let operation = self.log.redo()?;

        self.connections.broadcast_all(ServerMessage::RemoteRedo {
            operations: self.log.snapshot(),
        });
        log::debug!("Participant {} redid operation {}", from, operation.id);
        self.evict_stalled();
        Some(operation)
    }

    fn on_disconnect(&mut self, id: ParticipantId) {
        self.remove_participant(id);
        self.evict_stalled();
    }
}
