//! Row materializer: merge entity snapshots, column registry, and cell
//! store into renderable rows.

use crate::store::CellStore;
use serde::Serialize;
use std::collections::HashSet;
use uniboard_core::{
    CellKey, Column, ColumnId, FixedField, Timestamp, University, UniversityId, UniversityStatus,
};

/// What the grid renders in one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CellView {
    Ready {
        value: String,
        last_updated: Option<Timestamp>,
    },
    Loading,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowCell {
    pub column_id: ColumnId,
    pub view: CellView,
}

/// One renderable grid row: a fixed envelope, not an open record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub university_id: UniversityId,
    pub status: UniversityStatus,
    pub cells: Vec<RowCell>,
}

/// Build rows for the given (already visibility-filtered) universities.
///
/// Per column, in order: a loading cell renders as loading (stale values
/// stay hidden), then a committed value, then the university's own field
/// when the column is fixed, else empty. Universities in `processing` show
/// as processing regardless of their last known status.
pub fn materialize(
    universities: &[University],
    columns: &[Column],
    cells: &CellStore,
    processing: &HashSet<UniversityId>,
) -> Vec<Row> {
    universities
        .iter()
        .map(|university| {
            let status = if processing.contains(&university.id) {
                UniversityStatus::Processing
            } else {
                university.status
            };
            let cells = columns
                .iter()
                .map(|column| RowCell {
                    column_id: column.id.clone(),
                    view: cell_view(university, column, cells),
                })
                .collect();
            Row {
                university_id: university.id.clone(),
                status,
                cells,
            }
        })
        .collect()
}

fn cell_view(university: &University, column: &Column, cells: &CellStore) -> CellView {
    let key = CellKey {
        university_id: university.id.clone(),
        column_id: column.id.clone(),
    };
    let state = cells.get(&key);
    if state.loading {
        return CellView::Loading;
    }
    if let Some(value) = &state.value {
        return CellView::Ready {
            value: value.clone(),
            last_updated: state.last_updated_at,
        };
    }
    if let Some(field) = FixedField::from_column_id(&column.id) {
        return CellView::Ready {
            value: field.extract(university),
            last_updated: university.last_updated,
        };
    }
    CellView::Empty
}
