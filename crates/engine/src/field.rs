//! Field schema: the dynamic column set of the grid.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell_id::FieldKey;

/// A column definition as served by the fields endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "id")]
    pub key: FieldKey,
    pub label: String,
    #[serde(default)]
    pub is_editable: bool,
}

impl Field {
    pub fn new(key: impl Into<FieldKey>, label: impl Into<String>, is_editable: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            is_editable,
        }
    }
}

/// Ordered, immutable set of fields. Column order is the server's order.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    fields: Vec<Field>,
    index: HashMap<FieldKey, usize>,
}

impl FieldSchema {
    /// Build a schema. If the server repeats a key, the first definition wins.
    pub fn new(fields: Vec<Field>) -> Self {
        let mut unique = Vec::with_capacity(fields.len());
        let mut index = HashMap::with_capacity(fields.len());
        for field in fields {
            if index.contains_key(&field.key) {
                log::warn!("duplicate field key {:?} in schema, ignoring", field.key.as_str());
                continue;
            }
            index.insert(field.key.clone(), unique.len());
            unique.push(field);
        }
        Self { fields: unique, index }
    }

    pub fn get(&self, key: &FieldKey) -> Option<&Field> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
