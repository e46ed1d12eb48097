//! Cell state types for the grid's (university, column) value slots.

use crate::identity::{ColumnId, Timestamp, UniversityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Key of a single grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub university_id: UniversityId,
    pub column_id: ColumnId,
}

impl CellKey {
    pub fn new(university_id: impl Into<UniversityId>, column_id: impl Into<ColumnId>) -> Self {
        Self {
            university_id: university_id.into(),
            column_id: column_id.into(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.university_id, self.column_id)
    }
}

/// State of a single grid cell.
///
/// A cell is either loading or holds a definite value. `loading = false`
/// with `value = None` means "not yet requested" and is never an error.
/// While loading, any prior value is kept as a stale hint but not shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub loading: bool,
    pub value: Option<String>,
    /// Monotonic write version; commits carrying an older version than the
    /// cell's current one are rejected by the store.
    pub version: u64,
    pub last_updated_at: Option<Timestamp>,
}

impl CellState {
    /// The "not yet requested" state returned for absent cells.
    pub const VACANT: CellState = CellState {
        loading: false,
        value: None,
        version: 0,
        last_updated_at: None,
    };

    pub fn is_vacant(&self) -> bool {
        !self.loading && self.value.is_none()
    }
}

impl Default for CellState {
    fn default() -> Self {
        Self::VACANT
    }
}

/// One cell's worth of data in a batched fetch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDatum {
    pub value: Option<String>,
    #[serde(default)]
    pub last_updated: Option<Timestamp>,
}

/// Wire shape of `POST /api/columns/data/batch`:
/// `{ university_id: { column_id: { value, last_updated } } }`.
pub type BatchCellData = HashMap<UniversityId, HashMap<ColumnId, CellDatum>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_key_display() {
        let key = CellKey::new("u1", "deadline");
        assert_eq!(key.to_string(), "u1:deadline");
    }

    #[test]
    fn test_vacant_state() {
        let state = CellState::default();
        assert!(state.is_vacant());
        assert!(!state.loading);
        assert_eq!(state.version, 0);
    }

    #[test]
    fn test_batch_cell_data_wire_shape() {
        let json = r#"{"u1": {"c1": {"value": "MS CS", "last_updated": null}}}"#;
        let data: BatchCellData = serde_json::from_str(json).unwrap();
        let datum = &data[&UniversityId::new("u1")][&ColumnId::new("c1")];
        assert_eq!(datum.value.as_deref(), Some("MS CS"));
        assert!(datum.last_updated.is_none());
    }
}
