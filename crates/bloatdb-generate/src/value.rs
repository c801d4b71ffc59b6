use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A synthesized cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
    /// Naive UTC; bound as `timestamptz` when the column carries a zone.
    Timestamp(NaiveDateTime),
}

/// One value per table column, in column order.
pub type Row = Vec<SeedValue>;

impl SeedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SeedValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SeedValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SeedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            SeedValue::Uuid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SeedValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form of any non-null value.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SeedValue::Null => None,
            SeedValue::Text(value) => Some(value.clone()),
            other => Some(other.to_csv()),
        }
    }

    pub fn to_csv(&self) -> String {
        match self {
            SeedValue::Null => String::new(),
            SeedValue::Bool(value) => value.to_string(),
            SeedValue::Int(value) => value.to_string(),
            SeedValue::Text(value) => value.clone(),
            SeedValue::Uuid(value) => value.to_string(),
            SeedValue::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// Values of `row` at `indices`, in that order.
pub fn project(row: &[SeedValue], indices: &[usize]) -> Vec<SeedValue> {
    indices
        .iter()
        .map(|idx| row.get(*idx).cloned().unwrap_or(SeedValue::Null))
        .collect()
}
