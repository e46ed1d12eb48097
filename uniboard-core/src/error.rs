//! Error types for Uniboard operations

use crate::identity::ColumnId;
use thiserror::Error;

/// Column registry and lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ColumnError {
    #[error("Column not found: {id}")]
    NotFound { id: ColumnId },

    #[error("Column already registered: {id}")]
    Duplicate { id: ColumnId },

    #[error("Fixed column {id} cannot be deleted")]
    FixedImmutable { id: ColumnId },

    #[error("Global column {id} cannot be deleted by {email}")]
    GlobalImmutable { id: ColumnId, email: String },

    #[error("Column {id} is owned by another user")]
    NotOwner { id: ColumnId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_error_display() {
        let err = ColumnError::FixedImmutable {
            id: ColumnId::new("name"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Fixed column"));
        assert!(msg.contains("name"));

        let err = ColumnError::GlobalImmutable {
            id: ColumnId::new("c1"),
            email: "me@example.com".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("c1"));
        assert!(msg.contains("me@example.com"));
    }
}
