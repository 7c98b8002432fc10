//! In-memory cell store: every loaded lead and its per-field cells.
//!
//! The store is only mutated through confirmed writes (commit or undo
//! success). Nothing outside the controller writes to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellValue};
use crate::cell_id::{CellKey, FieldKey, LeadId};
use crate::field::{Field, FieldSchema};

/// A lead record: identity plus its cells keyed by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    #[serde(default)]
    pub fields: HashMap<FieldKey, Cell>,
}

impl Lead {
    pub fn new(id: impl Into<LeadId>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, field: impl Into<FieldKey>, cell: Cell) -> Self {
        self.fields.insert(field.into(), cell);
        self
    }

    pub fn cell(&self, field: &FieldKey) -> Option<&Cell> {
        self.fields.get(field)
    }
}

/// Everything the grid needs after the initial load.
#[derive(Debug, Clone, Default)]
pub struct GridData {
    pub fields: Vec<Field>,
    pub leads: Vec<Lead>,
}

/// Why a cell cannot enter edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRefusal {
    UnknownLead,
    UnknownField,
    FieldReadOnly,
    Locked,
    IntegrationSource,
}

impl std::fmt::Display for EditRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditRefusal::UnknownLead => write!(f, "no such lead"),
            EditRefusal::UnknownField => write!(f, "no such field"),
            EditRefusal::FieldReadOnly => write!(f, "field is read-only"),
            EditRefusal::Locked => write!(f, "cell is locked"),
            EditRefusal::IntegrationSource => write!(f, "value is managed by an integration"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CellStore {
    leads: Vec<Lead>,
    index: HashMap<LeadId, usize>,
}

impl CellStore {
    /// Build the store from loaded leads. Duplicate lead ids keep the first row.
    pub fn new(leads: Vec<Lead>) -> Self {
        let mut rows = Vec::with_capacity(leads.len());
        let mut index = HashMap::with_capacity(leads.len());
        for lead in leads {
            if index.contains_key(&lead.id) {
                log::warn!("duplicate lead id {} in page, ignoring", lead.id);
                continue;
            }
            index.insert(lead.id.clone(), rows.len());
            rows.push(lead);
        }
        Self { leads: rows, index }
    }

    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn lead(&self, id: &LeadId) -> Option<&Lead> {
        self.index.get(id).map(|&i| &self.leads[i])
    }

    pub fn contains(&self, id: &LeadId) -> bool {
        self.index.contains_key(id)
    }

    /// The stored cell, if the lead has one for this field.
    pub fn cell(&self, key: &CellKey) -> Option<&Cell> {
        self.lead(&key.lead).and_then(|lead| lead.cell(&key.field))
    }

    /// Current committed value; a missing cell reads as empty.
    pub fn committed_value(&self, key: &CellKey) -> CellValue {
        self.cell(key).map(|c| c.value.clone()).unwrap_or_default()
    }

    /// Editability is `field.is_editable && !locked && !integration source`.
    pub fn check_editable(&self, schema: &FieldSchema, key: &CellKey) -> Result<(), EditRefusal> {
        let field = schema.get(&key.field).ok_or(EditRefusal::UnknownField)?;
        let lead = self.lead(&key.lead).ok_or(EditRefusal::UnknownLead)?;
        if !field.is_editable {
            return Err(EditRefusal::FieldReadOnly);
        }
        match lead.cell(&key.field) {
            Some(cell) if cell.locked => Err(EditRefusal::Locked),
            Some(cell) if cell.source.is_integration() => Err(EditRefusal::IntegrationSource),
            _ => Ok(()),
        }
    }

    /// Record a confirmed write. The cell is created if the lead had none for
    /// this field. Returns false if the lead is not in the store.
    pub fn apply_write(&mut self, key: &CellKey, value: CellValue) -> bool {
        let Some(&i) = self.index.get(&key.lead) else {
            log::warn!("write confirmed for {} but lead is not loaded", key);
            return false;
        };
        self.leads[i]
            .fields
            .entry(key.field.clone())
            .or_default()
            .apply_manual_write(value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            Field::new("email", "Email", true),
            Field::new("score", "Score", false),
            Field::new("company", "Company", true),
        ])
    }

    fn store() -> CellStore {
        CellStore::new(vec![
            Lead::new("1")
                .with_cell("email", Cell::new(CellValue::Text("a@b.com".into())))
                .with_cell("company", Cell::new(CellValue::Text("Acme".into())).with_locked(true)),
            Lead::new("2").with_cell(
                "company",
                Cell::new(CellValue::Text("Globex".into())).with_source("integration:hubspot"),
            ),
        ])
    }

    #[test]
    fn test_lead_wire_format() {
        let json = r#"{"id": 12, "fields": {"email": {"value": "x@y.io", "source": "ai:enrich", "confidence": 0.7}}}"#;
        let lead: Lead = serde_json::from_str(json).unwrap();
        assert_eq!(lead.id.as_str(), "12");
        let cell = lead.cell(&FieldKey::from("email")).unwrap();
        assert!(cell.source.is_ai());
        assert_eq!(cell.confidence, Some(serde_json::json!(0.7)));
    }

    #[test]
    fn test_check_editable() {
        let s = schema();
        let st = store();
        assert_eq!(st.check_editable(&s, &CellKey::new("1", "email")), Ok(()));
        assert_eq!(st.check_editable(&s, &CellKey::new("1", "score")), Err(EditRefusal::FieldReadOnly));
        assert_eq!(st.check_editable(&s, &CellKey::new("1", "company")), Err(EditRefusal::Locked));
        assert_eq!(
            st.check_editable(&s, &CellKey::new("2", "company")),
            Err(EditRefusal::IntegrationSource)
        );
        assert_eq!(st.check_editable(&s, &CellKey::new("9", "email")), Err(EditRefusal::UnknownLead));
        assert_eq!(st.check_editable(&s, &CellKey::new("1", "phone")), Err(EditRefusal::UnknownField));
        // Missing cell on an editable field is editable
        assert_eq!(st.check_editable(&s, &CellKey::new("2", "email")), Ok(()));
    }

    #[test]
    fn test_apply_write_creates_missing_cell() {
        let mut st = store();
        let key = CellKey::new("2", "email");
        assert_eq!(st.committed_value(&key), CellValue::Empty);
        assert!(st.apply_write(&key, CellValue::Text("z@z.io".into())));
        let cell = st.cell(&key).unwrap();
        assert_eq!(cell.value, CellValue::Text("z@z.io".into()));
        assert_eq!(cell.source.as_str(), "manual");
    }

    #[test]
    fn test_apply_write_unknown_lead() {
        let mut st = store();
        assert!(!st.apply_write(&CellKey::new("404", "email"), CellValue::Empty));
    }

    #[test]
    fn test_duplicate_leads_keep_first() {
        let st = CellStore::new(vec![Lead::new("1"), Lead::new("1").with_cell("email", Cell::default())]);
        assert_eq!(st.leads().len(), 1);
        assert!(st.lead(&LeadId::from("1")).unwrap().fields.is_empty());
    }
}
