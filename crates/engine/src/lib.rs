//! Sans-IO core of the lead grid: cell store, validation, edit sessions,
//! debounced autosave, per-cell write ordering and single-step undo.
//!
//! `GridController` consumes UI and host events and emits `Effect`s; it never
//! performs I/O or reads a clock.

pub mod autosave;
pub mod cell;
pub mod cell_id;
pub mod controller;
pub mod events;
pub mod field;
pub mod session;
pub mod store;
pub mod undo;
pub mod validation;
pub mod view;

#[cfg(test)]
pub mod harness;

pub use autosave::{AutosaveConfig, SaveState, DEFAULT_DEBOUNCE};
pub use cell::{Cell, CellSource, CellValue, SourceKind};
pub use cell_id::{CellKey, FieldKey, LeadId};
pub use controller::GridController;
pub use events::{AutosaveToken, CommitOutcome, Effect, PatchRequest, RequestId, UndoOutcome, WriteKind};
pub use field::{Field, FieldSchema};
pub use session::{EditSession, SessionId};
pub use store::{CellStore, EditRefusal, GridData, Lead};
pub use undo::LastEdit;
pub use view::{CellView, ColumnView, GridView, RowView};
