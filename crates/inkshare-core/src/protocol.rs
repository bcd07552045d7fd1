//! Wire protocol between canvas clients and the sync server.
//!
//! Messages are JSON objects tagged by a `type` field:
//! ```json
//! { "type": "start_stroke", "x": 10, "y": 20, "color": "#000000", "width": 4, "tool": "brush" }
//! { "type": "end_stroke", "stroke": [ { "x": 10, "y": 20, ... } ] }
//! { "type": "undo" }
//! { "type": "remote_stroke_end", "id": 3, "stroke": [ ... ], "userId": "..." }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operation_log::{Operation, OperationId};
use crate::participants::{Participant, ParticipantId};
use crate::stroke::{Point, Stroke};

/// Protocol encode/decode errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Live pointer position on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// First point of an in-progress stroke
    StartStroke(Point),
    /// Next point of the in-progress stroke
    DrawPoint(Point),
    /// Finished stroke, to be committed
    EndStroke { stroke: Stroke },
    /// Pointer moved
    CursorMove(CursorPosition),
    /// Global undo
    Undo,
    /// Global redo
    Redo,
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Decode)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartStroke(_) => "start_stroke",
            ClientMessage::DrawPoint(_) => "draw_point",
            ClientMessage::EndStroke { .. } => "end_stroke",
            ClientMessage::CursorMove(_) => "cursor_move",
            ClientMessage::Undo => "undo",
            ClientMessage::Redo => "redo",
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full state for a newly connected participant
    InitState {
        operations: Vec<Operation>,
        users: Vec<Participant>,
    },
    /// Authoritative roster
    UserList { users: Vec<Participant> },
    /// A participant connected
    UserJoined { user_id: ParticipantId, color: String },
    /// A participant disconnected
    UserLeft { user_id: ParticipantId },
    /// A peer began a stroke
    RemoteStrokeStart { user_id: ParticipantId, point: Point },
    /// A peer extended its in-progress stroke
    RemoteDrawPoint { user_id: ParticipantId, point: Point },
    /// A peer's stroke was committed to the log
    RemoteStrokeEnd {
        id: OperationId,
        stroke: Stroke,
        user_id: ParticipantId,
    },
    /// A peer disconnected mid-stroke; its partial stroke will never commit
    RemoteStrokeAbandoned { user_id: ParticipantId },
    /// A peer's pointer moved
    RemoteCursorMove {
        user_id: ParticipantId,
        position: CursorPosition,
        color: String,
    },
    /// Log after an undo
    RemoteUndo { operations: Vec<Operation> },
    /// Log after a redo
    RemoteRedo { operations: Vec<Operation> },
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Decode)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::InitState { .. } => "init_state",
            ServerMessage::UserList { .. } => "user_list",
            ServerMessage::UserJoined { .. } => "user_joined",
            ServerMessage::UserLeft { .. } => "user_left",
            ServerMessage::RemoteStrokeStart { .. } => "remote_stroke_start",
            ServerMessage::RemoteDrawPoint { .. } => "remote_draw_point",
            ServerMessage::RemoteStrokeEnd { .. } => "remote_stroke_end",
            ServerMessage::RemoteStrokeAbandoned { .. } => "remote_stroke_abandoned",
            ServerMessage::RemoteCursorMove { .. } => "remote_cursor_move",
            ServerMessage::RemoteUndo { .. } => "remote_undo",
            ServerMessage::RemoteRedo { .. } => "remote_redo",
        }
    }

    /// Live relays a peer can miss without its document diverging.
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            ServerMessage::RemoteStrokeStart { .. }
                | ServerMessage::RemoteDrawPoint { .. }
                | ServerMessage::RemoteCursorMove { .. }
        )
    }

    /// Whether the message carries a full copy of the log.
    pub fn is_resync(&self) -> bool {
        matches!(
            self,
            ServerMessage::InitState { .. }
                | ServerMessage::RemoteUndo { .. }
                | ServerMessage::RemoteRedo { .. }
        )
    }
}
