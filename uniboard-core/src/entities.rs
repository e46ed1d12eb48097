//! Entity, column, and session types for the program-tracking grid.

use crate::identity::{ColumnId, Timestamp, UniversityId};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS
// ============================================================================

/// Computation status of a tracked university.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniversityStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// A single column finished computing for this university.
    ColumnProcessed,
}

impl UniversityStatus {
    /// Terminal statuses end the current computation cycle: no further
    /// value is coming for it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::ColumnProcessed => "column_processed",
        }
    }
}

/// Scope of a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnScope {
    /// Built-in column backed by a university field. Never deletable.
    Fixed,
    /// Shared across all users. Never deletable by non-admins.
    Global,
    /// Created by a single user, deletable by its owner.
    User,
}

/// Subscription tier reported by the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    Free,
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A tracked university, the row subject of the grid.
///
/// Owned by the external university service; the engine treats it as
/// read-mostly and refreshes it wholesale on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub id: UniversityId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub programs: Vec<String>,
    pub status: UniversityStatus,
    #[serde(default)]
    pub last_updated: Option<Timestamp>,
}

/// A grid column, fixed or user-created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub scope: ColumnScope,
    #[serde(default)]
    pub owner_email: Option<String>,
}

impl Column {
    pub fn fixed(id: &str, title: &str) -> Self {
        Self {
            id: ColumnId::new(id),
            title: title.to_string(),
            scope: ColumnScope::Fixed,
            owner_email: None,
        }
    }

    pub fn user(id: impl Into<ColumnId>, title: impl Into<String>, owner_email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            scope: ColumnScope::User,
            owner_email: Some(owner_email.into()),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.scope == ColumnScope::Fixed
    }
}

/// The signed-in dashboard user, as the engine needs to know them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
    pub is_admin: bool,
}

// ============================================================================
// FIXED COLUMNS
// ============================================================================

/// Number of built-in columns every grid carries.
pub const FIXED_COLUMN_COUNT: usize = 5;

/// The built-in columns backed directly by university fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedField {
    Name,
    Url,
    Programs,
    Status,
    LastUpdated,
}

impl FixedField {
    pub const ALL: [FixedField; FIXED_COLUMN_COUNT] = [
        FixedField::Name,
        FixedField::Url,
        FixedField::Programs,
        FixedField::Status,
        FixedField::LastUpdated,
    ];

    pub fn column_id(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Url => "url",
            Self::Programs => "programs",
            Self::Status => "status",
            Self::LastUpdated => "last_updated",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Url => "Website",
            Self::Programs => "Programs",
            Self::Status => "Status",
            Self::LastUpdated => "Last Updated",
        }
    }

    pub fn from_column_id(id: &ColumnId) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.column_id() == id.as_str())
    }

    /// Render the backing university field as grid text.
    pub fn extract(&self, university: &University) -> String {
        match self {
            Self::Name => university.name.clone(),
            Self::Url => university.url.clone(),
            Self::Programs => university.programs.join(", "),
            Self::Status => university.status.as_str().to_string(),
            Self::LastUpdated => university
                .last_updated
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}
