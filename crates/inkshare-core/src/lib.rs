//! InkShare Core Library
//!
//! Shared-state synchronization for a multi-user drawing canvas: the
//! authoritative operation log with global undo/redo, the participant roster,
//! the wire protocol and the coordinator that fans events out to connections.

pub mod connections;
pub mod coordinator;
pub mod operation_log;
pub mod participants;
pub mod protocol;
pub mod replica;
pub mod stroke;

pub use connections::{Broadcast, ConnectionSet, Outbox, OutboxReceiver, Outgoing, outbox};
pub use coordinator::{CoordinatorStats, SessionHandler, SyncCoordinator};
pub use operation_log::{Operation, OperationId, OperationLog};
pub use participants::{PALETTE, Participant, ParticipantId, ParticipantRegistry, random_color};
pub use protocol::{ClientMessage, CursorPosition, ProtocolError, ServerMessage};
pub use replica::{CanvasReplica, RemoteCursor};
pub use stroke::{Point, Stroke, StrokeError, Tool};
