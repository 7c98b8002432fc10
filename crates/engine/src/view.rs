//! Read-only view model of the grid.
//!
//! Rebuilt from the controller after every event; the terminal UI and the
//! plain printer both draw from it. Building a view never mutates state.

use crate::cell::{CellValue, SourceKind};
use crate::cell_id::{CellKey, FieldKey, LeadId};
use crate::controller::GridController;
use crate::undo::LastEdit;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView {
    pub key: FieldKey,
    pub label: String,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellView {
    /// The cell under the open edit session.
    Editing {
        buffer: String,
        validation_error: Option<String>,
        saving: bool,
        error: Option<String>,
    },
    Display {
        text: String,
        source: String,
        source_kind: SourceKind,
        locked: bool,
        saving: bool,
        error: Option<String>,
        /// Whether `start_edit` would be accepted.
        editable: bool,
        tooltip: Vec<String>,
    },
}

impl CellView {
    pub fn is_editing(&self) -> bool {
        matches!(self, CellView::Editing { .. })
    }

    pub fn is_saving(&self) -> bool {
        match self {
            CellView::Editing { saving, .. } | CellView::Display { saving, .. } => *saving,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CellView::Editing { error, .. } | CellView::Display { error, .. } => error.as_deref(),
        }
    }

    /// Text to draw in the cell body.
    pub fn text(&self) -> &str {
        match self {
            CellView::Editing { buffer, .. } => buffer,
            CellView::Display { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub lead: LeadId,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
    pub banner: String,
}

impl GridView {
    pub fn build(grid: &GridController) -> Self {
        let columns: Vec<ColumnView> = grid
            .schema()
            .iter()
            .map(|f| ColumnView {
                key: f.key.clone(),
                label: f.label.clone(),
                editable: f.is_editable,
            })
            .collect();

        let rows = grid
            .store()
            .leads()
            .iter()
            .map(|lead| RowView {
                lead: lead.id.clone(),
                cells: columns
                    .iter()
                    .map(|col| cell_view(grid, &CellKey::new(lead.id.clone(), col.key.clone())))
                    .collect(),
            })
            .collect();

        Self {
            columns,
            rows,
            banner: banner(grid.last_edit()),
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellView> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    /// Key of the cell at a grid position.
    pub fn key_at(&self, row: usize, col: usize) -> Option<CellKey> {
        let lead = &self.rows.get(row)?.lead;
        let field = &self.columns.get(col)?.key;
        Some(CellKey::new(lead.clone(), field.clone()))
    }
}

fn cell_view(grid: &GridController, key: &CellKey) -> CellView {
    let state = grid.save_state(key);
    if let Some(session) = grid.session().filter(|s| s.targets(key)) {
        return CellView::Editing {
            buffer: session.buffer().to_string(),
            validation_error: session.validation_error().map(str::to_string),
            saving: state.saving,
            error: state.error,
        };
    }

    let cell = grid.store().cell(key).cloned().unwrap_or_default();
    let mut tooltip = vec![format!("Source: {}", cell.source.as_str())];
    if cell.locked {
        tooltip.push("Locked: Yes".to_string());
    }
    if let Some(confidence) = cell.confidence.as_ref().and_then(confidence_text) {
        tooltip.push(format!("Confidence: {}", confidence));
    }

    CellView::Display {
        text: cell.value.raw_display(),
        source: cell.source.as_str().to_string(),
        source_kind: cell.source.kind(),
        locked: cell.locked,
        saving: state.saving,
        error: state.error,
        editable: grid.is_editable(key),
        tooltip,
    }
}

/// Falsy confidences (null, false, 0, "") are not shown.
fn confidence_text(value: &serde_json::Value) -> Option<String> {
    match CellValue::from(value.clone()) {
        CellValue::Empty | CellValue::Bool(false) => None,
        CellValue::Number(n) if n == 0.0 => None,
        CellValue::Text(s) if s.is_empty() => None,
        other => Some(other.raw_display()),
    }
}

/// "Last edit" banner text.
pub fn banner(last: Option<&LastEdit>) -> String {
    match last {
        Some(edit) => format!(
            "Last edit: {} on {}: changed from \"{}\" to \"{}\"",
            edit.field_key,
            edit.lead_id,
            edit.old_value.raw_display(),
            edit.new_value.raw_display()
        ),
        None => "No edits yet".to_string(),
    }
}
