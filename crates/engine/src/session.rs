//! The single active inline edit.

use crate::cell_id::CellKey;
use crate::events::AutosaveToken;

/// Identity of one edit session. Sessions are never reopened, so a write
/// tagged with a closed session's id can no longer affect editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub(crate) id: SessionId,
    pub(crate) key: CellKey,
    pub(crate) buffer: String,
    pub(crate) validation_error: Option<String>,
    /// Armed autosave timer owned by this session.
    pub(crate) timer: Option<AutosaveToken>,
    /// Set once this session submitted a write; cleared when the session has
    /// typed past what it submitted.
    pub(crate) awaiting: bool,
}

impl EditSession {
    pub(crate) fn open(id: SessionId, key: CellKey, seed: String) -> Self {
        Self {
            id,
            key,
            buffer: seed,
            validation_error: None,
            timer: None,
            awaiting: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn key(&self) -> &CellKey {
        &self.key
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn pending_timer(&self) -> Option<AutosaveToken> {
        self.timer
    }

    pub fn is_awaiting_write(&self) -> bool {
        self.awaiting
    }

    /// Caret position at the end of the buffer (byte offset).
    pub fn cursor_end(&self) -> usize {
        self.buffer.len()
    }

    pub fn targets(&self, key: &CellKey) -> bool {
        &self.key == key
    }
}
