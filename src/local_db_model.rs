//! Row and table definitions.
//!
//! Rows are schema-less JSON objects. The storage layer stays generic over
//! them; [`crate::records`] gives callers typed shapes that convert to and
//! from [`Row`] at the boundary.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One record in a table.
///
/// Serializes as a plain JSON object, so a stored table is a JSON array of
/// objects.
///
/// ```rust
/// use lifelink_core::local_db_model::Row;
/// use serde_json::json;
///
/// let row = Row::new()
///     .with("full_name", "Alex")
///     .with("blood_type", "O+")
///     .with("is_available", true);
///
/// assert_eq!(row.get("blood_type"), Some(&json!("O+")));
/// assert!(row.id().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, JsonValue>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The row id, when it is a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(JsonValue::as_str)
    }

    pub fn has_id(&self) -> bool {
        self.0.get("id").is_some_and(|id| !id.is_null())
    }

    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<JsonValue> {
        self.0.remove(column)
    }

    /// Strict equality on one column. A missing column matches nothing,
    /// not even `null`. Numbers compare by value, so `1` equals `1.0`.
    pub fn column_equals(&self, column: &str, value: &JsonValue) -> bool {
        match (self.0.get(column), value) {
            (Some(JsonValue::Number(stored)), JsonValue::Number(wanted)) => {
                stored == wanted || stored.as_f64() == wanted.as_f64()
            }
            (stored, _) => stored == Some(value),
        }
    }

    /// Shallow merge: every top-level key of `patch` replaces the one here.
    pub fn merge(&mut self, patch: &Row) {
        for (column, value) in &patch.0 {
            self.0.insert(column.clone(), value.clone());
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

impl From<Map<String, JsonValue>> for Row {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl TryFrom<JsonValue> for Row {
    type Error = JsonValue;

    /// Hands the value back when it is not an object.
    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl From<Row> for JsonValue {
    fn from(row: Row) -> Self {
        row.into_value()
    }
}

/// One or many rows handed to an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet(pub Vec<Row>);

impl From<Row> for RowSet {
    fn from(row: Row) -> Self {
        RowSet(vec![row])
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        RowSet(rows)
    }
}

impl<const N: usize> From<[Row; N]> for RowSet {
    fn from(rows: [Row; N]) -> Self {
        RowSet(rows.into())
    }
}

/// Tables the LifeLink application uses.
///
/// The client accepts any table name; these are the ones the domain layer
/// reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    DonorProfiles,
    SeekerProfiles,
    BloodRequests,
    Notifications,
    UserRoles,
}

impl TableName {
    pub const ALL: [TableName; 5] = [
        TableName::DonorProfiles,
        TableName::SeekerProfiles,
        TableName::BloodRequests,
        TableName::Notifications,
        TableName::UserRoles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::DonorProfiles => "donor_profiles",
            TableName::SeekerProfiles => "seeker_profiles",
            TableName::BloodRequests => "blood_requests",
            TableName::Notifications => "notifications",
            TableName::UserRoles => "user_roles",
        }
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
