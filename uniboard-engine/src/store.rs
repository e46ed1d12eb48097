//! Cell state store: the single source of truth rendered by the grid.
//!
//! All operations are O(1) amortized on a `CellKey` map. Mutation happens
//! only on the driver task, so the store needs no locking; correctness
//! rests on `commit` being the single atomic commit point for every
//! successful fetch, edit, or push-delivered update.

use std::collections::HashMap;
use tracing::debug;
use uniboard_core::{CellKey, CellState, ColumnId, Timestamp, UniversityId};

/// Per-(university, column) loading/value cache.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<CellKey, CellState>,
    write_counter: u64,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a monotonic write version.
    ///
    /// Operations take their version when they start; a commit carrying an
    /// older version than the cell's current one loses. This is what stops
    /// an in-flight backfill from clobbering a newer manual edit.
    pub fn next_version(&mut self) -> u64 {
        self.write_counter += 1;
        self.write_counter
    }

    /// Mark a cell loading. Any prior value is preserved as a stale hint
    /// (not shown while loading).
    pub fn set_loading(&mut self, key: &CellKey) {
        let cell = self.cells.entry(key.clone()).or_default();
        cell.loading = true;
    }

    /// Atomically clear loading and install a value.
    ///
    /// Returns false when the write is stale (older version than the cell's
    /// current one); the cell is left untouched in that case.
    pub fn commit(
        &mut self,
        key: &CellKey,
        value: Option<String>,
        version: u64,
        last_updated_at: Option<Timestamp>,
    ) -> bool {
        let cell = self.cells.entry(key.clone()).or_default();
        if version < cell.version {
            debug!(%key, version, current = cell.version, "dropping stale cell write");
            return false;
        }
        cell.loading = false;
        cell.value = value;
        cell.version = version;
        cell.last_updated_at = last_updated_at;
        true
    }

    /// Drop the loading flag without installing a value. Used for terminal
    /// status transitions and failed backfill rows.
    pub fn clear_loading(&mut self, key: &CellKey) {
        if let Some(cell) = self.cells.get_mut(key) {
            cell.loading = false;
        }
    }

    /// Drop loading flags for every cell of one university.
    pub fn clear_loading_for_entity(&mut self, university_id: &UniversityId) {
        for (key, cell) in self.cells.iter_mut() {
            if &key.university_id == university_id {
                cell.loading = false;
            }
        }
    }

    /// Current state of a cell; absent keys read as "not yet requested".
    pub fn get(&self, key: &CellKey) -> &CellState {
        static VACANT: CellState = CellState::VACANT;
        self.cells.get(key).unwrap_or(&VACANT)
    }

    /// Purge every cell of a deleted column so a reused id can never leak
    /// stale values.
    pub fn clear_for_column(&mut self, column_id: &ColumnId) {
        self.cells.retain(|key, _| &key.column_id != column_id);
    }

    /// Purge every cell of a university that left the visible set.
    pub fn clear_for_entity(&mut self, university_id: &UniversityId) {
        self.cells.retain(|key, _| &key.university_id != university_id);
    }

    /// Keep only cells whose university is in `keep`. Used when the entity
    /// list is replaced wholesale.
    pub fn retain_entities(&mut self, keep: &std::collections::HashSet<UniversityId>) {
        self.cells.retain(|key, _| keep.contains(&key.university_id));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(u: &str, c: &str) -> CellKey {
        CellKey::new(u, c)
    }

    #[test]
    fn test_vacant_read_for_missing_key() {
        let store = CellStore::new();
        let state = store.get(&key("u1", "c1"));
        assert!(state.is_vacant());
    }

    #[test]
    fn test_loading_preserves_prior_value() {
        let mut store = CellStore::new();
        let k = key("u1", "c1");
        let v = store.next_version();
        assert!(store.commit(&k, Some("old".to_string()), v, None));

        store.set_loading(&k);
        let state = store.get(&k);
        assert!(state.loading);
        assert_eq!(state.value.as_deref(), Some("old"));
    }

    #[test]
    fn test_commit_clears_loading() {
        let mut store = CellStore::new();
        let k = key("u1", "c1");
        store.set_loading(&k);
        let v = store.next_version();
        assert!(store.commit(&k, Some("new".to_string()), v, None));

        let state = store.get(&k);
        assert!(!state.loading);
        assert_eq!(state.value.as_deref(), Some("new"));
    }

    #[test]
    fn test_stale_version_rejected() {
        let mut store = CellStore::new();
        let k = key("u1", "c1");
        let stale = store.next_version();
        let fresh = store.next_version();

        assert!(store.commit(&k, Some("manual edit".to_string()), fresh, None));
        assert!(!store.commit(&k, Some("late backfill".to_string()), stale, None));

        assert_eq!(store.get(&k).value.as_deref(), Some("manual edit"));
    }

    #[test]
    fn test_equal_version_wins() {
        // Re-delivery of the same push event commits under a fresh version,
        // but an exact replay at the same version must stay idempotent.
        let mut store = CellStore::new();
        let k = key("u1", "c1");
        let v = store.next_version();
        assert!(store.commit(&k, Some("x".to_string()), v, None));
        assert!(store.commit(&k, Some("x".to_string()), v, None));
        assert_eq!(store.get(&k).value.as_deref(), Some("x"));
    }

    #[test]
    fn test_clear_for_column_purges_all_entities() {
        let mut store = CellStore::new();
        for u in ["u1", "u2", "u3"] {
            let k = key(u, "doomed");
            store.set_loading(&k);
        }
        let keep = key("u1", "kept");
        let v = store.next_version();
        store.commit(&keep, Some("stay".to_string()), v, None);

        store.clear_for_column(&ColumnId::new("doomed"));

        assert_eq!(store.len(), 1);
        for u in ["u1", "u2", "u3"] {
            let state = store.get(&key(u, "doomed"));
            assert!(state.is_vacant());
            assert!(!state.loading);
        }
        assert_eq!(store.get(&keep).value.as_deref(), Some("stay"));
    }

    #[test]
    fn test_clear_loading_for_entity() {
        let mut store = CellStore::new();
        store.set_loading(&key("u1", "c1"));
        store.set_loading(&key("u1", "c2"));
        store.set_loading(&key("u2", "c1"));

        store.clear_loading_for_entity(&UniversityId::new("u1"));

        assert!(!store.get(&key("u1", "c1")).loading);
        assert!(!store.get(&key("u1", "c2")).loading);
        assert!(store.get(&key("u2", "c1")).loading);
    }

    #[test]
    fn test_clear_for_entity() {
        let mut store = CellStore::new();
        let v = store.next_version();
        store.commit(&key("u1", "c1"), Some("a".to_string()), v, None);
        let v = store.next_version();
        store.commit(&key("u2", "c1"), Some("b".to_string()), v, None);

        store.clear_for_entity(&UniversityId::new("u1"));

        assert!(store.get(&key("u1", "c1")).is_vacant());
        assert_eq!(store.get(&key("u2", "c1")).value.as_deref(), Some("b"));
    }
}
