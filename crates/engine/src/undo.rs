//! Single-slot undo for inline edits.

use crate::cell::CellValue;
use crate::cell_id::{CellKey, FieldKey, LeadId};

/// The most recent successful commit.
#[derive(Clone, Debug, PartialEq)]
pub struct LastEdit {
    pub lead_id: LeadId,
    pub field_key: FieldKey,
    pub old_value: CellValue,
    pub new_value: CellValue,
}

impl LastEdit {
    pub fn new(key: &CellKey, old_value: CellValue, new_value: CellValue) -> Self {
        Self {
            lead_id: key.lead.clone(),
            field_key: key.field.clone(),
            old_value,
            new_value,
        }
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(self.lead_id.clone(), self.field_key.clone())
    }
}

#[derive(Debug, Default)]
pub struct UndoSlot {
    last: Option<LastEdit>,
    /// The edit an in-flight undo is reverting.
    reverting: Option<LastEdit>,
}

impl UndoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful commit, replacing whatever was there.
    pub fn record(&mut self, edit: LastEdit) {
        self.last = Some(edit);
    }

    pub fn last(&self) -> Option<&LastEdit> {
        self.last.as_ref()
    }

    pub fn is_reverting(&self) -> bool {
        self.reverting.is_some()
    }

    /// Start reverting the last edit. None if there is nothing to undo or an
    /// undo is already on its way.
    pub fn begin(&mut self) -> Option<LastEdit> {
        if self.reverting.is_some() {
            return None;
        }
        let edit = self.last.clone()?;
        self.reverting = Some(edit.clone());
        Some(edit)
    }

    /// Finish the in-flight undo. On success the slot is cleared, unless a
    /// newer commit replaced the edit while the undo was in flight.
    pub fn finish(&mut self, success: bool) {
        let Some(reverted) = self.reverting.take() else {
            return;
        };
        if success && self.last.as_ref() == Some(&reverted) {
            self.last = None;
        }
    }

    /// A newer commit landed before the pending undo was sent; the undo now
    /// reverts that commit instead.
    pub fn retarget(&mut self) {
        if self.reverting.is_some() {
            self.reverting = self.last.clone();
        }
    }

    /// The undo write was dropped before it was sent.
    pub fn abandon(&mut self) {
        self.reverting = None;
    }
}
