//! The authoritative ordered log of committed strokes.
//!
//! Undo and redo are global and linear: any new commit invalidates the redo
//! history, and a redone operation is appended to the end of the log rather
//! than restored to its original position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::participants::ParticipantId;
use crate::stroke::{Stroke, StrokeError};

/// Identifier assigned to an operation at commit time.
pub type OperationId = u64;

/// A committed stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub stroke: Stroke,
    pub author_id: ParticipantId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Committed operations plus the redo stack.
///
/// An operation id lives in exactly one of the two stacks.
#[derive(Debug, Default)]
pub struct OperationLog {
    /// Document order, oldest first.
    committed: Vec<Operation>,
    /// Most recently undone last.
    redo_stack: Vec<Operation>,
    next_id: OperationId,
}

impl OperationLog {
    /// Create an empty log. Ids start at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stroke to the log, assigning it the next id.
    ///
    /// Clears the redo stack. Ids are never reused, even after undo.
    pub fn commit(
        &mut self,
        stroke: Stroke,
        author_id: ParticipantId,
    ) -> Result<Operation, StrokeError> {
        stroke.validate()?;

        let operation = Operation {
            id: self.next_id,
            stroke,
            author_id,
            created_at: Utc::now(),
        };
        self.next_id += 1;

        self.committed.push(operation.clone());
        self.redo_stack.clear();

        Ok(operation)
    }

    /// Move the last committed operation onto the redo stack.
    ///
    /// Returns `None` on an empty log.
    pub fn undo(&mut self) -> Option<Operation> {
        let operation = self.committed.pop()?;
        self.redo_stack.push(operation.clone());
        Some(operation)
    }

    /// Move the most recently undone operation back to the end of the log.
    ///
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Operation> {
        let operation = self.redo_stack.pop()?;
        self.committed.push(operation.clone());
        Some(operation)
    }

    /// Owned copy of the committed operations in document order.
    pub fn snapshot(&self) -> Vec<Operation> {
        self.committed.clone()
    }

    /// Borrowed view of the committed operations.
    pub fn operations(&self) -> &[Operation] {
        &self.committed
    }

    /// Drop all history and restart ids at 0.
    pub fn reset(&mut self) {
        self.committed.clear();
        self.redo_stack.clear();
        self.next_id = 0;
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Id the next commit will receive.
    pub fn next_id(&self) -> OperationId {
        self.next_id
    }
}
