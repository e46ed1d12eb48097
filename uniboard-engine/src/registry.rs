//! Column registry: schema of fixed + dynamic columns and their
//! ownership/deletability rules.

use uniboard_core::{Column, ColumnError, ColumnId, ColumnScope, FixedField, UserIdentity};

/// Ordered column schema. The five fixed columns come first, dynamic
/// columns follow in registration order.
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
}

impl ColumnRegistry {
    /// A registry seeded with the built-in fixed columns.
    pub fn with_fixed() -> Self {
        let columns = FixedField::ALL
            .into_iter()
            .map(|field| Column::fixed(field.column_id(), field.title()))
            .collect();
        Self { columns }
    }

    pub fn list(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|column| &column.id == id)
    }

    pub fn contains(&self, id: &ColumnId) -> bool {
        self.get(id).is_some()
    }

    /// Register a new column. Ids are never silently recreated, so a
    /// duplicate registration is an error.
    pub fn add(&mut self, column: Column) -> Result<(), ColumnError> {
        if self.contains(&column.id) {
            return Err(ColumnError::Duplicate { id: column.id });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Unregister a column and return it.
    pub fn remove(&mut self, id: &ColumnId) -> Result<Column, ColumnError> {
        let index = self
            .columns
            .iter()
            .position(|column| &column.id == id)
            .ok_or_else(|| ColumnError::NotFound { id: id.clone() })?;
        Ok(self.columns.remove(index))
    }

    /// Deletability rule: fixed columns never; global columns only by an
    /// admin; user columns by their owner or an admin.
    pub fn can_delete(column: &Column, user: &UserIdentity) -> bool {
        if column.is_fixed() {
            return false;
        }
        if user.is_admin {
            return true;
        }
        column.scope != ColumnScope::Global && column.owner_email.as_deref() == Some(&user.email)
    }

    /// Check that `user` may delete the column, with a precise error for
    /// each refusal. Runs before any store mutation.
    pub fn authorize_remove(&self, id: &ColumnId, user: &UserIdentity) -> Result<(), ColumnError> {
        let column = self
            .get(id)
            .ok_or_else(|| ColumnError::NotFound { id: id.clone() })?;
        if Self::can_delete(column, user) {
            return Ok(());
        }
        if column.is_fixed() {
            Err(ColumnError::FixedImmutable { id: id.clone() })
        } else if column.scope == ColumnScope::Global {
            Err(ColumnError::GlobalImmutable {
                id: id.clone(),
                email: user.email.clone(),
            })
        } else {
            Err(ColumnError::NotOwner { id: id.clone() })
        }
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::with_fixed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniboard_core::FIXED_COLUMN_COUNT;

    fn owner() -> UserIdentity {
        UserIdentity {
            email: "me@example.com".to_string(),
            is_admin: false,
        }
    }

    fn admin() -> UserIdentity {
        UserIdentity {
            email: "admin@example.com".to_string(),
            is_admin: true,
        }
    }

    fn stranger() -> UserIdentity {
        UserIdentity {
            email: "other@example.com".to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn test_seeded_with_fixed_columns() {
        let registry = ColumnRegistry::with_fixed();
        assert_eq!(registry.list().len(), FIXED_COLUMN_COUNT);
        assert!(registry.contains(&ColumnId::new("name")));
        assert!(registry.contains(&ColumnId::new("last_updated")));
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut registry = ColumnRegistry::with_fixed();
        let column = Column::user("c1", "Deadline", "me@example.com");
        registry.add(column.clone()).unwrap();
        assert_eq!(
            registry.add(column),
            Err(ColumnError::Duplicate {
                id: ColumnId::new("c1")
            })
        );
    }

    #[test]
    fn test_can_delete_matrix() {
        let user_column = Column::user("c1", "Deadline", "me@example.com");
        let global_column = Column {
            id: ColumnId::new("g1"),
            title: "Ranking".to_string(),
            scope: ColumnScope::Global,
            owner_email: None,
        };
        let fixed_column = Column::fixed("name", "Name");

        assert!(ColumnRegistry::can_delete(&user_column, &owner()));
        assert!(ColumnRegistry::can_delete(&user_column, &admin()));
        assert!(!ColumnRegistry::can_delete(&user_column, &stranger()));

        assert!(!ColumnRegistry::can_delete(&global_column, &owner()));
        assert!(ColumnRegistry::can_delete(&global_column, &admin()));

        assert!(!ColumnRegistry::can_delete(&fixed_column, &owner()));
        assert!(!ColumnRegistry::can_delete(&fixed_column, &admin()));
    }

    #[test]
    fn test_authorize_remove_errors() {
        let mut registry = ColumnRegistry::with_fixed();
        registry
            .add(Column::user("c1", "Deadline", "me@example.com"))
            .unwrap();

        assert!(registry.authorize_remove(&ColumnId::new("c1"), &owner()).is_ok());
        assert_eq!(
            registry.authorize_remove(&ColumnId::new("c1"), &stranger()),
            Err(ColumnError::NotOwner {
                id: ColumnId::new("c1")
            })
        );
        assert_eq!(
            registry.authorize_remove(&ColumnId::new("name"), &admin()),
            Err(ColumnError::FixedImmutable {
                id: ColumnId::new("name")
            })
        );
        assert!(matches!(
            registry.authorize_remove(&ColumnId::new("missing"), &owner()),
            Err(ColumnError::NotFound { .. })
        ));
    }
}
