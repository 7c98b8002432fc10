//! Grid controller: the per-cell edit lifecycle.
//!
//! Owns the field schema, the cell store, the single edit session, the write
//! tracker and the undo slot. Every public operation is one discrete UI or
//! host event; effects for the host accumulate in an outbox drained with
//! `take_effects()`.
//!
//! Invariants:
//! - At most one `EditSession`; at most one armed autosave timer, owned by it.
//! - Every path that closes a session cancels its timer.
//! - At most one write per cell in flight (see `autosave`).
//! - The cell store changes only when a write is confirmed.
//! - A write outliving its session never reopens it.

use crate::autosave::{
    AutosaveConfig, InFlightWrite, PendingWrite, SaveState, SaveTracker, Submitted, TokenSource,
    WriteOrigin,
};
use crate::cell::CellValue;
use crate::cell_id::CellKey;
use crate::events::{AutosaveToken, CommitOutcome, Effect, RequestId, UndoOutcome, WriteKind};
use crate::field::FieldSchema;
use crate::session::{EditSession, SessionId};
use crate::store::{CellStore, EditRefusal, GridData};
use crate::undo::{LastEdit, UndoSlot};
use crate::validation;

pub struct GridController {
    schema: FieldSchema,
    store: CellStore,
    session: Option<EditSession>,
    tracker: SaveTracker,
    undo: UndoSlot,
    config: AutosaveConfig,
    tokens: TokenSource,
    next_session: u64,
    outbox: Vec<Effect>,
}

impl GridController {
    pub fn new(data: GridData, config: AutosaveConfig) -> Self {
        Self {
            schema: FieldSchema::new(data.fields),
            store: CellStore::new(data.leads),
            session: None,
            tracker: SaveTracker::new(),
            undo: UndoSlot::new(),
            config,
            tokens: TokenSource::default(),
            next_session: 0,
            outbox: Vec::new(),
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn config(&self) -> AutosaveConfig {
        self.config
    }

    pub fn save_state(&self, key: &CellKey) -> SaveState {
        self.tracker.state(key)
    }

    pub fn last_edit(&self) -> Option<&LastEdit> {
        self.undo.last()
    }

    pub fn is_editable(&self, key: &CellKey) -> bool {
        self.store.check_editable(&self.schema, key).is_ok()
    }

    /// True while any write is in flight.
    pub fn has_pending_writes(&self) -> bool {
        self.tracker.in_flight_count() > 0
    }

    /// Drain effects produced since the last call.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    // =========================================================================
    // Edit sessions
    // =========================================================================

    /// Open an inline editor on `key`.
    ///
    /// Refused if the cell is not editable. Re-opening the cell already being
    /// edited is a no-op. Any other open session is closed first, as if it
    /// lost focus: its buffer is committed, and an invalid draft is dropped.
    pub fn start_edit(&mut self, key: CellKey) -> Result<(), EditRefusal> {
        if let Err(refusal) = self.store.check_editable(&self.schema, &key) {
            log::debug!("edit of {} refused: {}", key, refusal);
            return Err(refusal);
        }
        if self.session.as_ref().is_some_and(|s| s.targets(&key)) {
            return Ok(());
        }
        self.leave_open_session();

        self.next_session += 1;
        let seed = self.store.committed_value(&key).raw_display();
        let session = EditSession::open(SessionId(self.next_session), key.clone(), seed);
        self.tracker.clear_error(&key);
        self.outbox.push(Effect::FocusEditor {
            key,
            cursor: session.cursor_end(),
        });
        self.session = Some(session);
        Ok(())
    }

    fn leave_open_session(&mut self) {
        let Some(key) = self.session.as_ref().map(|s| s.key.clone()) else {
            return;
        };
        match self.commit(&key) {
            CommitOutcome::BlockedByValidation => {
                log::info!("discarding invalid draft for {}", key);
                self.close_session();
            }
            // The write carries on without its session
            CommitOutcome::Sent(_) | CommitOutcome::Queued => self.close_session(),
            CommitOutcome::Unchanged | CommitOutcome::NoSession => {}
        }
    }

    /// Replace the session buffer (one keystroke). Returns false if no
    /// session is open.
    ///
    /// The pending timer is always cancelled. A valid buffer re-arms it; an
    /// invalid one records the error and arms nothing.
    pub fn update_buffer(&mut self, text: impl Into<String>) -> bool {
        let Some(session) = self.session.as_mut() else {
            log::debug!("buffer update without an open session ignored");
            return false;
        };
        let text = text.into();
        if let Some(token) = session.timer.take() {
            self.outbox.push(Effect::CancelAutosave { token });
        }

        let result = validation::validate(session.key.field.as_str(), &text);
        session.buffer = text;
        session.validation_error = result.into_error();

        if session.validation_error.is_none() {
            let token = self.tokens.next();
            session.timer = Some(token);
            self.outbox.push(Effect::ArmAutosave {
                token,
                delay: self.config.debounce,
            });
        }
        true
    }

    /// Commit the session editing `key`.
    ///
    /// Guards, in order: a validation error refuses the commit and keeps the
    /// session open; a buffer equal to the last known value closes the session
    /// without a write; otherwise a PATCH for the single field is issued, or
    /// queued behind a write already in flight for the cell.
    pub fn commit(&mut self, key: &CellKey) -> CommitOutcome {
        let (session_id, buffer, validation_error) = match self.session.as_mut() {
            Some(s) if s.targets(key) => {
                if let Some(token) = s.timer.take() {
                    self.outbox.push(Effect::CancelAutosave { token });
                }
                (s.id, s.buffer.clone(), s.validation_error.clone())
            }
            _ => {
                log::debug!("commit for {} ignored: no open session", key);
                return CommitOutcome::NoSession;
            }
        };

        if let Some(error) = validation_error {
            log::debug!("commit for {} blocked: {}", key, error);
            return CommitOutcome::BlockedByValidation;
        }

        let last_known = self
            .tracker
            .latest_value(key)
            .cloned()
            .unwrap_or_else(|| self.store.committed_value(key));
        if last_known.raw_display() == buffer {
            self.close_session();
            return CommitOutcome::Unchanged;
        }

        if let Some(s) = self.session.as_mut() {
            s.awaiting = true;
        }
        self.tracker.clear_error(key);
        let write = PendingWrite {
            key: key.clone(),
            value: CellValue::from_buffer(&buffer),
            kind: WriteKind::Commit,
            origin: WriteOrigin::Session(session_id),
        };
        match self.submit(write) {
            Some(id) => CommitOutcome::Sent(id),
            None => CommitOutcome::Queued,
        }
    }

    /// Confirm key: commit the open session now.
    pub fn confirm(&mut self) -> CommitOutcome {
        self.commit_open_session()
    }

    /// Editor lost focus: commit the open session now.
    pub fn blur(&mut self) -> CommitOutcome {
        self.commit_open_session()
    }

    /// Focus moved to another cell. Commits like `blur`, but a write it
    /// issues finishes without the session. A draft refused by validation
    /// keeps the session open.
    pub fn leave(&mut self) -> CommitOutcome {
        let outcome = self.commit_open_session();
        if matches!(outcome, CommitOutcome::Sent(_) | CommitOutcome::Queued) {
            self.close_session();
        }
        outcome
    }

    fn commit_open_session(&mut self) -> CommitOutcome {
        match self.session.as_ref().map(|s| s.key.clone()) {
            Some(key) => self.commit(&key),
            None => CommitOutcome::NoSession,
        }
    }

    /// Cancel key: discard the session. No write, no store change, save
    /// state untouched. Returns false if no session was open.
    pub fn cancel_edit(&mut self) -> bool {
        if self.session.is_none() {
            return false;
        }
        self.close_session();
        true
    }

    /// The host's autosave timer elapsed. Tokens not owned by the open
    /// session are stale and ignored.
    pub fn autosave_fired(&mut self, token: AutosaveToken) -> CommitOutcome {
        let key = match self.session.as_mut() {
            Some(s) if s.timer == Some(token) => {
                s.timer = None;
                s.key.clone()
            }
            _ => {
                log::debug!("stale autosave token {} ignored", token.raw());
                return CommitOutcome::NoSession;
            }
        };
        self.commit(&key)
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(token) = session.timer {
                self.outbox.push(Effect::CancelAutosave { token });
            }
        }
    }

    // =========================================================================
    // Undo
    // =========================================================================

    /// Revert the last successful commit by writing its old value back.
    pub fn undo(&mut self) -> UndoOutcome {
        if self.undo.is_reverting() {
            return UndoOutcome::AlreadyPending;
        }
        let Some(edit) = self.undo.begin() else {
            return UndoOutcome::NothingToUndo;
        };
        let key = edit.key();
        log::info!("undo {}: restoring {:?}", key, edit.old_value.raw_display());
        self.tracker.clear_error(&key);
        let write = PendingWrite {
            key,
            value: edit.old_value,
            kind: WriteKind::Undo,
            origin: WriteOrigin::Undo,
        };
        match self.submit(write) {
            Some(id) => UndoOutcome::Sent(id),
            None => UndoOutcome::Queued,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn submit(&mut self, write: PendingWrite) -> Option<RequestId> {
        let current = self.store.committed_value(&write.key);
        match self.tracker.submit(write, &current) {
            Submitted::Issued(request) => {
                log::info!("PATCH {} for {}", request.id, request.key);
                let id = request.id;
                self.outbox.push(Effect::SendPatch(request));
                Some(id)
            }
            Submitted::Queued { replaced } => {
                if let Some(dropped) = replaced {
                    self.forget(dropped);
                }
                None
            }
        }
    }

    fn issue_queued(&mut self, key: &CellKey) {
        let current = self.store.committed_value(key);
        if let Some(request) = self.tracker.issue_queued(key, &current) {
            log::info!("PATCH {} for {} (queued)", request.id, request.key);
            self.outbox.push(Effect::SendPatch(request));
        }
    }

    fn forget(&mut self, dropped: PendingWrite) {
        log::debug!("dropped unsent write for {}", dropped.key);
        if dropped.kind == WriteKind::Undo {
            self.undo.abandon();
        }
    }

    /// The host finished the PATCH `id`. `Err` carries the message shown in
    /// the cell. Unknown ids are ignored.
    pub fn write_resolved(&mut self, id: RequestId, result: Result<(), String>) {
        let Some(done) = self.tracker.resolve(id) else {
            log::warn!("completion for unknown request {} ignored", id);
            return;
        };
        match result {
            Ok(()) => self.write_succeeded(done),
            Err(message) => self.write_failed(done, message),
        }
    }

    fn write_succeeded(&mut self, done: InFlightWrite) {
        let InFlightWrite { id, write, old_value } = done;
        let key = write.key.clone();
        self.store.apply_write(&key, write.value.clone());
        self.tracker.clear_error(&key);
        match write.kind {
            WriteKind::Commit => {
                log::info!("saved {} ({})", key, id);
                self.undo
                    .record(LastEdit::new(&key, old_value.clone(), write.value.clone()));
                // An undo queued behind this commit must revert it, not the edit before
                if self.tracker.retarget_queued_undo(&key, old_value) {
                    log::debug!("queued undo for {} now reverts {}", key, id);
                    self.undo.retarget();
                }
            }
            WriteKind::Undo => {
                log::info!("undo of {} saved ({})", key, id);
                self.undo.finish(true);
            }
        }
        self.issue_queued(&key);

        let close = match self.session.as_mut() {
            Some(s) if s.targets(&key) && s.awaiting => {
                let own = write.origin == WriteOrigin::Session(s.id);
                if own && s.buffer == write.value.raw_display() {
                    true
                } else if self.tracker.is_saving(&key) {
                    false
                } else if s.buffer == write.value.raw_display() {
                    true
                } else {
                    // Typed past the saved value; its own autosave is armed
                    s.awaiting = false;
                    false
                }
            }
            _ => false,
        };
        if close {
            self.close_session();
        }
    }

    fn write_failed(&mut self, done: InFlightWrite, message: String) {
        let key = done.write.key.clone();
        log::warn!("write {} for {} failed: {}", done.id, key, message);
        self.tracker.set_error(&key, message);
        if done.write.kind == WriteKind::Undo {
            self.undo.finish(false);
        }
        if let Some(dropped) = self.tracker.drop_queued_from(&key, done.write.origin) {
            self.forget(dropped);
        }
        // The edit text is lost on failure; the user re-edits to retry
        if let WriteOrigin::Session(origin) = done.write.origin {
            if self.session.as_ref().is_some_and(|s| s.id == origin) {
                self.close_session();
            }
        }
        self.issue_queued(&key);
    }
}
