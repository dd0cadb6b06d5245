use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An invoice or quotation as returned by the API.
///
/// Documents stay schemaless: field names come from the [`DocumentSchema`] that fetched
/// them, and absent fields are left absent for the report to fill in.
///
/// [`DocumentSchema`]: super::DocumentSchema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Field rendered as text. Numbers and booleans are stringified; empty strings count
    /// as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// First present field among `keys`.
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    /// Numeric field; numeric strings such as `"1200"` or `"1200.0"` are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    /// Nested objects under `key`, such as line items. Non-object entries are skipped.
    pub fn items(&self, key: &str) -> Vec<Document> {
        match self.get(key) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| entry.as_object().cloned().map(Document))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
