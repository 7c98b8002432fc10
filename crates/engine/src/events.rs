//! Effects emitted by the grid controller.
//!
//! The controller never touches the network or a clock. Every state change
//! that needs the outside world is expressed as an `Effect` the host executes:
//! arm or cancel the autosave timer, send a PATCH, move input focus. The host
//! reports back through `GridController::autosave_fired` and
//! `GridController::write_resolved`.

use std::time::Duration;

use crate::cell::CellValue;
use crate::cell_id::CellKey;

/// Handle for one armed autosave timer. Tokens are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AutosaveToken(pub(crate) u64);

impl AutosaveToken {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Identifier of one issued PATCH. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a write is for. Undo writes never record a new last edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Commit,
    Undo,
}

/// A single-field PATCH for the host to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    pub id: RequestId,
    pub key: CellKey,
    pub value: CellValue,
    pub kind: WriteKind,
}

impl PatchRequest {
    /// Request body: only the changed field.
    pub fn body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(
            self.key.field.as_str().to_string(),
            serde_json::Value::from(self.value.clone()),
        );
        serde_json::Value::Object(body)
    }
}

/// Instruction for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a one-shot timer; call `autosave_fired(token)` when it elapses.
    ArmAutosave { token: AutosaveToken, delay: Duration },
    /// Drop the timer for `token` if it has not fired.
    CancelAutosave { token: AutosaveToken },
    /// Send the PATCH; call `write_resolved(id, result)` when it completes.
    SendPatch(PatchRequest),
    /// Focus the inline editor for `key` with the caret at byte offset `cursor`.
    FocusEditor { key: CellKey, cursor: usize },
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No open session targets this cell.
    NoSession,
    /// A validation error is present; the session stays open.
    BlockedByValidation,
    /// Buffer equals the last known value; session closed without a write.
    Unchanged,
    /// PATCH issued.
    Sent(RequestId),
    /// Another write for the cell is in flight; this one goes next.
    Queued,
}

/// Outcome of an undo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    NothingToUndo,
    AlreadyPending,
    Sent(RequestId),
    Queued,
}
