//! Client-side mirror of the shared canvas.
//!
//! Applies server events in arrival order and keeps everything a view needs
//! to draw: committed operations, peers' in-progress strokes, cursors and the
//! roster. The committed operations alone are enough to rebuild the canvas.

use std::collections::HashMap;

use crate::operation_log::{Operation, OperationId};
use crate::participants::{Participant, ParticipantId};
use crate::protocol::{CursorPosition, ProtocolError, ServerMessage};
use crate::stroke::Point;

/// A peer's pointer as last reported.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub position: CursorPosition,
    pub color: String,
}

/// Replicated canvas state.
#[derive(Debug, Default)]
pub struct CanvasReplica {
    operations: Vec<Operation>,
    users: Vec<Participant>,
    remote_strokes: HashMap<ParticipantId, Vec<Point>>,
    cursors: HashMap<ParticipantId, RemoteCursor>,
}

impl CanvasReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply a server frame.
    pub fn apply_json(&mut self, json: &str) -> Result<(), ProtocolError> {
        let msg = ServerMessage::from_json(json)?;
        self.apply(&msg);
        Ok(())
    }

    /// Apply one server event.
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::InitState { operations, users } => {
                self.operations = operations.clone();
                self.users = users.clone();
                self.remote_strokes.clear();
                self.cursors.clear();
            }
            ServerMessage::UserList { users } => {
                self.users = users.clone();
            }
            ServerMessage::UserJoined { user_id, .. } => {
                log::debug!("Peer {} joined", user_id);
            }
            ServerMessage::UserLeft { user_id } => {
                self.remote_strokes.remove(user_id);
                self.cursors.remove(user_id);
            }
            ServerMessage::RemoteStrokeStart { user_id, point } => {
                self.remote_strokes.insert(*user_id, vec![point.clone()]);
            }
            ServerMessage::RemoteDrawPoint { user_id, point } => {
                // Points for a stroke whose start we never saw are ignored.
                if let Some(points) = self.remote_strokes.get_mut(user_id) {
                    points.push(point.clone());
                }
            }
            ServerMessage::RemoteStrokeEnd {
                id,
                stroke,
                user_id,
            } => {
                self.remote_strokes.remove(user_id);
                // The commit event has no timestamp; stamp it on receipt.
                self.operations.push(Operation {
                    id: *id,
                    stroke: stroke.clone(),
                    author_id: *user_id,
                    created_at: chrono::Utc::now(),
                });
            }
            ServerMessage::RemoteStrokeAbandoned { user_id } => {
                self.remote_strokes.remove(user_id);
            }
            ServerMessage::RemoteCursorMove {
                user_id,
                position,
                color,
            } => {
                self.cursors.insert(
                    *user_id,
                    RemoteCursor {
                        position: *position,
                        color: color.clone(),
                    },
                );
            }
            ServerMessage::RemoteUndo { operations } | ServerMessage::RemoteRedo { operations } => {
                self.operations = operations.clone();
            }
        }
    }

    /// Committed operations in document order.
    ///
    /// Operations learned from `remote_stroke_end` carry the local receive
    /// time as `created_at`; snapshots (`init_state`, `remote_undo`,
    /// `remote_redo`) replace them with the server's timestamps. Compare ids,
    /// authors and strokes when checking convergence, not timestamps.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation_ids(&self) -> Vec<OperationId> {
        self.operations.iter().map(|op| op.id).collect()
    }

    pub fn users(&self) -> &[Participant] {
        &self.users
    }

    /// A peer's uncommitted stroke, if one is being drawn.
    pub fn remote_stroke(&self, id: &ParticipantId) -> Option<&[Point]> {
        self.remote_strokes.get(id).map(Vec::as_slice)
    }

    pub fn cursor(&self, id: &ParticipantId) -> Option<&RemoteCursor> {
        self.cursors.get(id)
    }
}
