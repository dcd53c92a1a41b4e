use serde::{Deserialize, Serialize};

/// JSON-compatible data types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
    Null,
}

/// Data schema attached to property values, action input/output and event
/// payloads. Consumed as already-validated description data; the runtime
/// does not enforce it on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    /// Declared value type.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional unit of measure (e.g. `"celsius"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DataSchema {
    /// Creates a schema for the given type with no title or unit.
    #[must_use]
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type,
            title: None,
            unit: None,
        }
    }

    /// Sets the unit of measure.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
