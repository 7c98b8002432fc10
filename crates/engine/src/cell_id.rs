//! Cell identity for the lead grid.
//!
//! A `CellKey` uniquely identifies one (lead, field) pair. It keys the
//! per-cell save state, the write tracker and the edit session target.

use serde::{Deserialize, Serialize};

/// Identity of a lead record.
///
/// The API sends ids as either numbers or strings; both normalise to the
/// same textual form so `7` and `"7"` name the same lead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawLeadId", into = "String")]
pub struct LeadId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLeadId {
    Number(serde_json::Number),
    Text(String),
}

impl From<RawLeadId> for LeadId {
    fn from(raw: RawLeadId) -> Self {
        match raw {
            RawLeadId::Number(n) => LeadId(n.to_string()),
            RawLeadId::Text(s) => LeadId(s),
        }
    }
}

impl From<LeadId> for String {
    fn from(id: LeadId) -> Self {
        id.0
    }
}

impl LeadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LeadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LeadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for LeadId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a field (column) in the schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a cell: one field of one lead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub lead: LeadId,
    pub field: FieldKey,
}

impl CellKey {
    #[inline]
    pub fn new(lead: impl Into<LeadId>, field: impl Into<FieldKey>) -> Self {
        Self {
            lead: lead.into(),
            field: field.into(),
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.lead, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_id_from_number_and_string() {
        let a: LeadId = serde_json::from_str("42").unwrap();
        let b: LeadId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn test_lead_id_from_large_and_fractional_numbers() {
        let big: LeadId = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big.as_str(), "18446744073709551615");
        let neg: LeadId = serde_json::from_str("-3").unwrap();
        assert_eq!(neg.as_str(), "-3");
        let float: LeadId = serde_json::from_str("7.5").unwrap();
        assert_eq!(float.as_str(), "7.5");
    }

    #[test]
    fn test_cell_key_from_owned_strings() {
        let key = CellKey::new(String::from("101"), String::from("email"));
        assert_eq!(key, CellKey::new("101", "email"));
    }

    #[test]
    fn test_lead_id_serializes_as_string() {
        let id = LeadId::from(7u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
    }

    #[test]
    fn test_cell_key_display() {
        let key = CellKey::new("lead-1", "email");
        assert_eq!(key.to_string(), "lead-1:email");
    }

    #[test]
    fn test_cell_key_equality() {
        let a = CellKey::new("1", "email");
        let b = CellKey::new(LeadId::from(1u64), FieldKey::from("email"));
        let c = CellKey::new("1", "phone");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
