//! Test host for the grid controller.
//!
//! `Host` plays the part of the UI runtime: it drains effects after every
//! call, keeps the single armed timer, and records PATCHes until a test
//! resolves them. Nothing here sleeps; firing the timer is explicit.

use crate::autosave::AutosaveConfig;
use crate::cell::{Cell, CellValue};
use crate::cell_id::CellKey;
use crate::controller::GridController;
use crate::events::{AutosaveToken, CommitOutcome, Effect, PatchRequest, RequestId, UndoOutcome};
use crate::field::Field;
use crate::store::{EditRefusal, GridData, Lead};

/// Two leads over five fields: an editable email/phone/name, a locked
/// company cell, an integration-sourced industry and a read-only score.
pub fn sample_data() -> GridData {
    GridData {
        fields: vec![
            Field::new("name", "Name", true),
            Field::new("email", "Email", true),
            Field::new("phone", "Phone", true),
            Field::new("company", "Company", true),
            Field::new("industry", "Industry", true),
            Field::new("score", "Score", false),
        ],
        leads: vec![
            Lead::new("1")
                .with_cell("name", Cell::new(CellValue::Text("Ada".into())))
                .with_cell("email", Cell::new(CellValue::Text("a@b.com".into())))
                .with_cell("phone", Cell::new(CellValue::Text("555 123 4567".into())))
                .with_cell(
                    "company",
                    Cell::new(CellValue::Text("Acme".into())).with_locked(true),
                )
                .with_cell(
                    "industry",
                    Cell::new(CellValue::Text("Retail".into())).with_source("integration:hubspot"),
                )
                .with_cell("score", Cell::new(CellValue::Number(42.0))),
            Lead::new("2")
                .with_cell("name", Cell::new(CellValue::Text("Grace".into())))
                .with_cell(
                    "email",
                    Cell::new(CellValue::Text("g@h.io".into()))
                        .with_source("ai:enrichment")
                        .with_confidence(serde_json::json!(0.82)),
                ),
        ],
    }
}

pub struct Host {
    pub grid: GridController,
    /// The single armed autosave timer.
    pub timer: Option<AutosaveToken>,
    pub cancelled: Vec<AutosaveToken>,
    pub focus: Option<(CellKey, usize)>,
    sent: Vec<PatchRequest>,
}

impl Host {
    pub fn new(data: GridData) -> Self {
        Self {
            grid: GridController::new(data, AutosaveConfig::default()),
            timer: None,
            cancelled: Vec::new(),
            focus: None,
            sent: Vec::new(),
        }
    }

    pub fn pump(&mut self) {
        for effect in self.grid.take_effects() {
            match effect {
                Effect::ArmAutosave { token, .. } => {
                    assert!(self.timer.is_none(), "second timer armed while {:?} pending", self.timer);
                    self.timer = Some(token);
                }
                Effect::CancelAutosave { token } => {
                    if self.timer == Some(token) {
                        self.timer = None;
                    }
                    self.cancelled.push(token);
                }
                Effect::SendPatch(request) => self.sent.push(request),
                Effect::FocusEditor { key, cursor } => self.focus = Some((key, cursor)),
            }
        }
    }

    pub fn start(&mut self, lead: &str, field: &str) -> Result<(), EditRefusal> {
        let result = self.grid.start_edit(CellKey::new(lead, field));
        self.pump();
        result
    }

    pub fn type_text(&mut self, text: &str) {
        assert!(self.grid.update_buffer(text), "no open session");
        self.pump();
    }

    /// Let the armed timer elapse.
    pub fn settle(&mut self) -> CommitOutcome {
        let token = self.timer.take().expect("no timer armed");
        let outcome = self.grid.autosave_fired(token);
        self.pump();
        outcome
    }

    pub fn confirm(&mut self) -> CommitOutcome {
        let outcome = self.grid.confirm();
        self.pump();
        outcome
    }

    pub fn undo(&mut self) -> UndoOutcome {
        let outcome = self.grid.undo();
        self.pump();
        outcome
    }

    pub fn respond_ok(&mut self, id: RequestId) {
        self.grid.write_resolved(id, Ok(()));
        self.pump();
    }

    pub fn respond_err(&mut self, id: RequestId, message: &str) {
        self.grid.write_resolved(id, Err(message.to_string()));
        self.pump();
    }

    pub fn take_sent(&mut self) -> Vec<PatchRequest> {
        self.pump();
        std::mem::take(&mut self.sent)
    }
}
