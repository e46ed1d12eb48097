//! Uniboard Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no sync logic, no network calls.

mod cell;
mod entities;
mod error;
mod events;
mod identity;

pub use cell::{BatchCellData, CellDatum, CellKey, CellState};
pub use entities::{
    Column, ColumnScope, FixedField, SubscriptionStatus, University, UniversityStatus,
    UserIdentity, FIXED_COLUMN_COUNT,
};
pub use error::ColumnError;
pub use events::{PushEvent, UniversityUpdate, UserUpdate, UserUpdateKind};
pub use identity::{ColumnId, Timestamp, UniversityId};
