use serde::{Deserialize, Serialize};

/// Untyped scalar held by a lead cell.
///
/// The wire format is plain JSON. Arrays and objects are not expected from the
/// API; if one shows up it is kept as its JSON text so it still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<CellValue> for serde_json::Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => serde_json::Value::Null,
            CellValue::Text(s) => serde_json::Value::String(s),
            CellValue::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Bool(b) => serde_json::Value::Bool(b),
        }
    }
}

impl CellValue {
    /// Value typed into the inline editor. Always sent as text, even when empty.
    pub fn from_buffer(buffer: &str) -> Self {
        CellValue::Text(buffer.to_string())
    }

    /// Textual form used for the editor seed, display, and change detection.
    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => b.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// Provenance classes of a cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Manual,
    Integration,
    Ai,
}

/// Provenance tag of a cell: `manual`, `integration`, `ai`, or one of the
/// latter two with a `:<subtype>` suffix.
///
/// Classification is by prefix, so `integration:hubspot` is an integration
/// source. The raw tag is kept verbatim for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellSource(String);

impl Default for CellSource {
    fn default() -> Self {
        CellSource::manual()
    }
}

impl CellSource {
    pub const MANUAL: &'static str = "manual";
    pub const INTEGRATION: &'static str = "integration";
    pub const AI: &'static str = "ai";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn manual() -> Self {
        Self(Self::MANUAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> SourceKind {
        if self.0.starts_with(Self::AI) {
            SourceKind::Ai
        } else if self.0.starts_with(Self::INTEGRATION) {
            SourceKind::Integration
        } else {
            SourceKind::Manual
        }
    }

    pub fn is_integration(&self) -> bool {
        self.kind() == SourceKind::Integration
    }

    pub fn is_ai(&self) -> bool {
        self.kind() == SourceKind::Ai
    }

    /// The part after `:` in tags like `ai:enrichment`.
    pub fn subtype(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, sub)| sub).filter(|s| !s.is_empty())
    }
}

/// Value and metadata for one (lead, field) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, deserialize_with = "source_or_manual")]
    pub source: CellSource,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<serde_json::Value>,
}

fn source_or_manual<'de, D>(deserializer: D) -> Result<CellSource, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let tag: Option<String> = Option::deserialize(deserializer)?;
    Ok(tag
        .filter(|t| !t.is_empty())
        .map(CellSource)
        .unwrap_or_default())
}

// Only a literal `true` locks a cell.
fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw == serde_json::Value::Bool(true))
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = CellSource::new(source);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_confidence(mut self, confidence: serde_json::Value) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Cell-level half of the editability rule. The field's own flag is
    /// checked by the store.
    pub fn accepts_user_edits(&self) -> bool {
        !self.locked && !self.source.is_integration()
    }

    /// Apply a confirmed write: the value becomes a manual, unlocked entry.
    /// Confidence is left as the server last reported it.
    pub fn apply_manual_write(&mut self, value: CellValue) {
        self.value = value;
        self.source = CellSource::manual();
        self.locked = false;
    }
}
