//! Autosave pipeline: debounce configuration and per-cell write tracking.
//!
//! Ordering rule: at most one write per cell is in flight. A write submitted
//! while another is in flight for the same cell waits in a single queued slot;
//! a later submission replaces the queued one (latest intent wins) and is
//! issued once the in-flight write resolves. Writes for different cells are
//! independent.

use std::collections::HashMap;
use std::time::Duration;

use crate::cell::CellValue;
use crate::cell_id::CellKey;
use crate::events::{AutosaveToken, PatchRequest, RequestId, WriteKind};
use crate::session::SessionId;

/// Quiet period after the last valid keystroke before a commit.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub debounce: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl AutosaveConfig {
    pub fn with_debounce(debounce: Duration) -> Self {
        Self { debounce }
    }
}

/// Monotonic source of autosave tokens.
#[derive(Debug, Default)]
pub(crate) struct TokenSource {
    next: u64,
}

impl TokenSource {
    pub(crate) fn next(&mut self) -> AutosaveToken {
        self.next += 1;
        AutosaveToken(self.next)
    }
}

/// Who asked for a write. Failure handling drops queued writes from the same
/// origin as the failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    Session(SessionId),
    Undo,
}

/// A write that has not been sent yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub key: CellKey,
    pub value: CellValue,
    pub kind: WriteKind,
    pub origin: WriteOrigin,
}

/// A write on the wire, with the committed value it replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightWrite {
    pub id: RequestId,
    pub write: PendingWrite,
    pub old_value: CellValue,
}

/// Per-cell transient save flags, as shown by the grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveState {
    pub saving: bool,
    pub error: Option<String>,
}

/// Result of submitting a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Issued(PatchRequest),
    Queued { replaced: Option<PendingWrite> },
}

#[derive(Debug, Default)]
pub struct SaveTracker {
    next_request: u64,
    in_flight: HashMap<CellKey, InFlightWrite>,
    by_id: HashMap<RequestId, CellKey>,
    queued: HashMap<CellKey, PendingWrite>,
    errors: HashMap<CellKey, String>,
}

impl SaveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `write` now, or queue it behind the in-flight write for its cell.
    /// `current` is the committed value the write would replace.
    pub fn submit(&mut self, write: PendingWrite, current: &CellValue) -> Submitted {
        if self.in_flight.contains_key(&write.key) {
            let key = write.key.clone();
            let replaced = self.queued.insert(key.clone(), write);
            if replaced.is_some() {
                log::debug!("coalesced queued write for {}", key);
            }
            return Submitted::Queued { replaced };
        }
        Submitted::Issued(self.issue(write, current.clone()))
    }

    fn issue(&mut self, write: PendingWrite, old_value: CellValue) -> PatchRequest {
        self.next_request += 1;
        let id = RequestId(self.next_request);
        let request = PatchRequest {
            id,
            key: write.key.clone(),
            value: write.value.clone(),
            kind: write.kind,
        };
        self.by_id.insert(id, write.key.clone());
        self.in_flight.insert(
            write.key.clone(),
            InFlightWrite {
                id,
                write,
                old_value,
            },
        );
        request
    }

    /// Remove and return the in-flight write for `id`. Unknown or already
    /// resolved ids return None.
    pub fn resolve(&mut self, id: RequestId) -> Option<InFlightWrite> {
        let key = self.by_id.remove(&id)?;
        match self.in_flight.remove(&key) {
            Some(write) if write.id == id => Some(write),
            Some(other) => {
                // Not ours; put it back
                self.in_flight.insert(key, other);
                None
            }
            None => None,
        }
    }

    /// Issue the queued write for `key`, if any. Must be called after the
    /// in-flight write for `key` resolved.
    pub fn issue_queued(&mut self, key: &CellKey, current: &CellValue) -> Option<PatchRequest> {
        if self.in_flight.contains_key(key) {
            return None;
        }
        let write = self.queued.remove(key)?;
        Some(self.issue(write, current.clone()))
    }

    /// Drop the queued write for `key` if it came from `origin`.
    pub fn drop_queued_from(&mut self, key: &CellKey, origin: WriteOrigin) -> Option<PendingWrite> {
        if self.queued.get(key).map(|w| w.origin) == Some(origin) {
            self.queued.remove(key)
        } else {
            None
        }
    }

    /// Point a queued undo for `key` at `value`. False if no undo is queued.
    pub fn retarget_queued_undo(&mut self, key: &CellKey, value: CellValue) -> bool {
        match self.queued.get_mut(key) {
            Some(write) if write.origin == WriteOrigin::Undo => {
                write.value = value;
                true
            }
            _ => false,
        }
    }

    /// Newest value headed for the server: queued, else in flight.
    pub fn latest_value(&self, key: &CellKey) -> Option<&CellValue> {
        self.queued
            .get(key)
            .map(|w| &w.value)
            .or_else(|| self.in_flight.get(key).map(|w| &w.write.value))
    }

    pub fn is_saving(&self, key: &CellKey) -> bool {
        self.in_flight.contains_key(key) || self.queued.contains_key(key)
    }

    pub fn in_flight(&self, key: &CellKey) -> Option<&InFlightWrite> {
        self.in_flight.get(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn set_error(&mut self, key: &CellKey, message: impl Into<String>) {
        self.errors.insert(key.clone(), message.into());
    }

    pub fn clear_error(&mut self, key: &CellKey) {
        self.errors.remove(key);
    }

    pub fn error(&self, key: &CellKey) -> Option<&str> {
        self.errors.get(key).map(|s| s.as_str())
    }

    pub fn state(&self, key: &CellKey) -> SaveState {
        SaveState {
            saving: self.is_saving(key),
            error: self.errors.get(key).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(key: &CellKey, value: &str, session: u64) -> PendingWrite {
        PendingWrite {
            key: key.clone(),
            value: CellValue::Text(value.into()),
            kind: WriteKind::Commit,
            origin: WriteOrigin::Session(SessionId(session)),
        }
    }

    #[test]
    fn test_token_source_is_monotonic() {
        let mut tokens = TokenSource::default();
        let a = tokens.next();
        let b = tokens.next();
        assert!(b > a);
    }

    #[test]
    fn test_first_write_is_issued() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        let submitted = tracker.submit(commit(&key, "a@b.com", 1), &CellValue::Empty);
        let Submitted::Issued(req) = submitted else { panic!("expected issue") };
        assert_eq!(req.key, key);
        assert!(tracker.is_saving(&key));
        assert_eq!(tracker.in_flight(&key).unwrap().old_value, CellValue::Empty);
    }

    #[test]
    fn test_second_write_queues_and_coalesces() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        let Submitted::Issued(first) = tracker.submit(commit(&key, "a@b.com", 1), &CellValue::Empty) else {
            panic!("expected issue")
        };
        assert_eq!(
            tracker.submit(commit(&key, "b@b.com", 1), &CellValue::Empty),
            Submitted::Queued { replaced: None }
        );
        let Submitted::Queued { replaced } = tracker.submit(commit(&key, "c@b.com", 1), &CellValue::Empty) else {
            panic!("expected queue")
        };
        assert_eq!(replaced.unwrap().value, CellValue::Text("b@b.com".into()));
        assert_eq!(tracker.latest_value(&key), Some(&CellValue::Text("c@b.com".into())));

        // Nothing queued may go out while the first is in flight
        assert!(tracker.issue_queued(&key, &CellValue::Empty).is_none());

        tracker.resolve(first.id).unwrap();
        let next = tracker.issue_queued(&key, &CellValue::Text("a@b.com".into())).unwrap();
        assert_eq!(next.value, CellValue::Text("c@b.com".into()));
        assert_eq!(
            tracker.in_flight(&key).unwrap().old_value,
            CellValue::Text("a@b.com".into())
        );
    }

    #[test]
    fn test_other_cells_are_independent() {
        let mut tracker = SaveTracker::new();
        let a = CellKey::new("1", "email");
        let b = CellKey::new("1", "phone");
        assert!(matches!(tracker.submit(commit(&a, "x", 1), &CellValue::Empty), Submitted::Issued(_)));
        assert!(matches!(tracker.submit(commit(&b, "y", 2), &CellValue::Empty), Submitted::Issued(_)));
        assert_eq!(tracker.in_flight_count(), 2);
    }

    #[test]
    fn test_resolve_unknown_or_twice() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        let Submitted::Issued(req) = tracker.submit(commit(&key, "x", 1), &CellValue::Empty) else {
            panic!("expected issue")
        };
        assert!(tracker.resolve(RequestId(99)).is_none());
        assert!(tracker.resolve(req.id).is_some());
        assert!(tracker.resolve(req.id).is_none());
        assert!(!tracker.is_saving(&key));
    }

    #[test]
    fn test_drop_queued_only_from_same_origin() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        tracker.submit(commit(&key, "x", 1), &CellValue::Empty);
        tracker.submit(commit(&key, "y", 2), &CellValue::Empty);
        assert!(tracker.drop_queued_from(&key, WriteOrigin::Session(SessionId(1))).is_none());
        assert!(tracker.drop_queued_from(&key, WriteOrigin::Session(SessionId(2))).is_some());
        assert_eq!(tracker.latest_value(&key), Some(&CellValue::Text("x".into())));
    }

    #[test]
    fn test_retarget_touches_only_queued_undo() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        tracker.submit(commit(&key, "b@c.io", 1), &CellValue::Empty);
        assert!(!tracker.retarget_queued_undo(&key, CellValue::Empty));

        tracker.submit(commit(&key, "c@d.io", 1), &CellValue::Empty);
        assert!(!tracker.retarget_queued_undo(&key, CellValue::Empty));
        assert_eq!(tracker.latest_value(&key), Some(&CellValue::Text("c@d.io".into())));

        tracker.submit(
            PendingWrite {
                key: key.clone(),
                value: CellValue::Text("a@b.io".into()),
                kind: WriteKind::Undo,
                origin: WriteOrigin::Undo,
            },
            &CellValue::Empty,
        );
        assert!(tracker.retarget_queued_undo(&key, CellValue::Text("b@c.io".into())));
        assert_eq!(tracker.latest_value(&key), Some(&CellValue::Text("b@c.io".into())));
    }

    #[test]
    fn test_save_state_flags() {
        let mut tracker = SaveTracker::new();
        let key = CellKey::new("1", "email");
        assert_eq!(tracker.state(&key), SaveState::default());
        tracker.set_error(&key, "API error 500: boom");
        assert_eq!(tracker.state(&key).error.as_deref(), Some("API error 500: boom"));
        tracker.clear_error(&key);
        assert!(tracker.error(&key).is_none());
    }
}
