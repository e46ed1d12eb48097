//! Engine state: everything the driver task exclusively owns.
//!
//! No locking anywhere. All mutation funnels through the driver task, and
//! the atomic, side-effect-free store setters carry the correctness burden.

use crate::batch::BatchQueue;
use crate::ingest::{classify, Classification};
use crate::lifecycle::BackfillTarget;
use crate::materialize::{materialize, Row};
use crate::notifications::{Notification, NotificationLevel};
use crate::registry::ColumnRegistry;
use crate::store::CellStore;
use crate::visibility::{visible_slice, VisibilityPolicy};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uniboard_core::{
    CellKey, Column, ColumnError, ColumnId, PushEvent, SubscriptionStatus, Timestamp, University,
    UniversityId, UniversityStatus, UserIdentity,
};

/// Debounce window for whole-entity detail refreshes: rarer and
/// user-visible sooner, so it fires fast.
pub const DETAIL_DEBOUNCE: Duration = Duration::from_millis(500);

/// Debounce window for per-cell data refreshes: higher volume, benefits
/// more from coalescing.
pub const CELL_DEBOUNCE: Duration = Duration::from_millis(1000);

const NOTIFICATION_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Session user; push events for anyone else are discarded.
    pub session_email: String,
    pub detail_debounce: Duration,
    pub cell_debounce: Duration,
    pub notification_capacity: usize,
}

impl EngineConfig {
    pub fn new(session_email: impl Into<String>) -> Self {
        Self {
            session_email: session_email.into(),
            detail_debounce: DETAIL_DEBOUNCE,
            cell_debounce: CELL_DEBOUNCE,
            notification_capacity: NOTIFICATION_CAPACITY,
        }
    }
}

/// Immutable view published to renderers after every mutation.
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub rows: Arc<[Row]>,
    /// Rows withheld by the subscription tier; drives the "N universities
    /// hidden" banner.
    pub hidden_count: usize,
    pub channel_up: bool,
    pub notifications: Vec<Notification>,
}

impl GridSnapshot {
    pub fn empty() -> Self {
        Self {
            rows: Arc::from(Vec::new()),
            hidden_count: 0,
            channel_up: false,
            notifications: Vec::new(),
        }
    }
}

/// Batches whose trailing-edge deadline has passed.
#[derive(Debug, Default)]
pub struct DueBatches {
    pub details: Option<Vec<UniversityId>>,
    pub cells: Option<Vec<UniversityId>>,
}

/// The cell-synchronization engine state.
pub struct GridEngine {
    config: EngineConfig,
    universities: Vec<University>,
    columns: ColumnRegistry,
    cells: CellStore,
    policy: VisibilityPolicy,
    processing: HashSet<UniversityId>,
    detail_queue: BatchQueue,
    cell_queue: BatchQueue,
    notifications: VecDeque<Notification>,
    channel_up: bool,
}

impl GridEngine {
    pub fn new(config: EngineConfig, policy: VisibilityPolicy) -> Self {
        let detail_queue = BatchQueue::new(config.detail_debounce);
        let cell_queue = BatchQueue::new(config.cell_debounce);
        Self {
            config,
            universities: Vec::new(),
            columns: ColumnRegistry::with_fixed(),
            cells: CellStore::new(),
            policy,
            processing: HashSet::new(),
            detail_queue,
            cell_queue,
            notifications: VecDeque::new(),
            channel_up: false,
        }
    }

    pub fn session_email(&self) -> &str {
        &self.config.session_email
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub fn policy(&self) -> VisibilityPolicy {
        self.policy
    }

    // ========================================================================
    // ENTITY LIST
    // ========================================================================

    /// Replace the entity list wholesale. Cells for entities that are gone
    /// or no longer visible are purged.
    pub fn load_universities(&mut self, universities: Vec<University>) {
        self.universities = universities;
        let keep: HashSet<UniversityId> = self
            .visible_universities()
            .iter()
            .map(|u| u.id.clone())
            .collect();
        self.cells.retain_entities(&keep);
        self.processing.retain(|id| keep.contains(id));
    }

    /// Merge fresh entity snapshots, preserving row order; ids the grid has
    /// never seen are appended.
    pub fn merge_details(&mut self, universities: Vec<University>) {
        for incoming in universities {
            match self
                .universities
                .iter_mut()
                .find(|u| u.id == incoming.id)
            {
                Some(existing) => *existing = incoming,
                None => self.universities.push(incoming),
            }
        }
    }

    pub fn is_known(&self, id: &UniversityId) -> bool {
        self.universities.iter().any(|u| &u.id == id)
    }

    fn set_status(&mut self, id: &UniversityId, status: UniversityStatus) {
        if let Some(university) = self.universities.iter_mut().find(|u| &u.id == id) {
            university.status = status;
        }
    }

    // ========================================================================
    // VISIBILITY
    // ========================================================================

    pub fn visible_universities(&self) -> &[University] {
        visible_slice(&self.universities, &self.policy).0
    }

    pub fn hidden_count(&self) -> usize {
        visible_slice(&self.universities, &self.policy).1
    }

    pub fn is_visible(&self, id: &UniversityId) -> bool {
        self.visible_universities().iter().any(|u| &u.id == id)
    }

    /// Install a new visibility policy.
    ///
    /// Rows that drop out of the visible set have their cells purged; ids
    /// that become visible are returned so the caller can fetch their
    /// details and cell data (only the newly revealed ids, never the whole
    /// table).
    pub fn set_policy(&mut self, policy: VisibilityPolicy) -> Vec<UniversityId> {
        let old_count = self.policy.visible_count(self.universities.len());
        let new_count = policy.visible_count(self.universities.len());
        self.policy = policy;

        if new_count < old_count {
            let hidden: Vec<UniversityId> = self.universities[new_count..old_count]
                .iter()
                .map(|u| u.id.clone())
                .collect();
            for id in &hidden {
                self.cells.clear_for_entity(id);
                self.processing.remove(id);
            }
            Vec::new()
        } else {
            self.universities[old_count..new_count]
                .iter()
                .map(|u| u.id.clone())
                .collect()
        }
    }

    // ========================================================================
    // COLUMNS
    // ========================================================================

    /// Register dynamic columns fetched at bootstrap. Duplicates are
    /// logged and skipped, never re-registered.
    pub fn load_columns(&mut self, columns: Vec<Column>) {
        for column in columns {
            if let Err(err) = self.columns.add(column) {
                warn!(%err, "skipping column from bootstrap list");
            }
        }
    }

    pub fn register_column(&mut self, column: Column) -> Result<(), ColumnError> {
        self.columns.add(column)
    }

    pub fn authorize_remove_column(
        &self,
        id: &ColumnId,
        user: &UserIdentity,
    ) -> Result<(), ColumnError> {
        self.columns.authorize_remove(id, user)
    }

    /// Unregister a column and purge all of its cells, so a reused id can
    /// never surface stale values.
    pub fn purge_column(&mut self, id: &ColumnId) -> Result<Column, ColumnError> {
        let column = self.columns.remove(id)?;
        self.cells.clear_for_column(id);
        Ok(column)
    }

    /// Mark every visible row's cell for a new column loading, before any
    /// backend work, and return the backfill targets in row order.
    pub fn mark_new_column_loading(&mut self, column_id: &ColumnId) -> Vec<BackfillTarget> {
        let targets: Vec<BackfillTarget> = self
            .visible_universities()
            .iter()
            .map(|u| BackfillTarget {
                university_id: u.id.clone(),
                university_name: u.name.clone(),
            })
            .collect();
        for target in &targets {
            let key = CellKey {
                university_id: target.university_id.clone(),
                column_id: column_id.clone(),
            };
            self.cells.set_loading(&key);
        }
        targets
    }

    // ========================================================================
    // CELL WRITES
    // ========================================================================

    /// Allocate a version for a write that is about to start.
    pub fn begin_write(&mut self) -> u64 {
        self.cells.next_version()
    }

    /// Commit a cell value. Writes targeting an unregistered column or a
    /// non-visible entity are silently dropped: deletions race with
    /// in-flight operations and that is fine.
    pub fn commit_cell(
        &mut self,
        university_id: &UniversityId,
        column_id: &ColumnId,
        value: Option<String>,
        version: u64,
        last_updated_at: Option<Timestamp>,
    ) -> bool {
        if !self.columns.contains(column_id) {
            debug!(%column_id, "dropping write to unregistered column");
            return false;
        }
        if !self.is_visible(university_id) {
            debug!(%university_id, "dropping write to non-visible university");
            return false;
        }
        let key = CellKey {
            university_id: university_id.clone(),
            column_id: column_id.clone(),
        };
        self.cells.commit(&key, value, version, last_updated_at)
    }

    /// Drop one cell's loading flag without a value ("no information
    /// available"). Used when a backfill row fails.
    pub fn clear_cell_loading(&mut self, university_id: &UniversityId, column_id: &ColumnId) {
        let key = CellKey {
            university_id: university_id.clone(),
            column_id: column_id.clone(),
        };
        self.cells.clear_loading(&key);
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Classify and apply one push event. Events are handled strictly in
    /// arrival order; only the resulting network calls coalesce.
    pub fn ingest(&mut self, event: &PushEvent, now: Instant) {
        let classification = classify(event, &self.config.session_email);
        debug!(event = event.event_type(), ?classification, "ingesting push event");
        match classification {
            Classification::Discard(reason) => {
                debug!(?reason, "discarding push event");
            }
            Classification::DirectApply {
                university_id,
                column_id,
                value,
            } => {
                if self.is_known(&university_id) {
                    self.set_status(&university_id, UniversityStatus::ColumnProcessed);
                }
                let version = self.cells.next_version();
                self.commit_cell(
                    &university_id,
                    &column_id,
                    Some(value),
                    version,
                    Some(chrono::Utc::now()),
                );
            }
            Classification::Terminal {
                university_id,
                status,
            } => {
                self.set_status(&university_id, status);
                // Terminal for this cycle: no further value is coming, so
                // no cell may stay stuck on loading.
                self.cells.clear_loading_for_entity(&university_id);
                self.processing.remove(&university_id);
            }
            Classification::StatusOnly {
                university_id,
                status,
            } => {
                self.set_status(&university_id, status);
                if status == UniversityStatus::Processing {
                    self.processing.insert(university_id);
                }
            }
            Classification::NeedsRefetch { university_id } => {
                if self.is_known(&university_id) {
                    self.cell_queue.enqueue(university_id, now);
                } else {
                    debug!(%university_id, "refetch signal for unknown university ignored");
                }
            }
            Classification::ProcessingStarted { university_ids } => {
                for id in university_ids {
                    if self.is_known(&id) {
                        self.set_status(&id, UniversityStatus::Processing);
                        self.processing.insert(id);
                    }
                }
            }
            Classification::SubscriptionReactivated => {
                let mut policy = self.policy;
                policy.subscription = SubscriptionStatus::Active;
                let revealed = self.set_policy(policy);
                if !revealed.is_empty() {
                    info!(count = revealed.len(), "subscription reactivated, fetching revealed rows");
                }
                self.enqueue_refresh(revealed, now);
            }
        }
    }

    // ========================================================================
    // BATCH QUEUES
    // ========================================================================

    pub fn enqueue_cell_refresh(&mut self, id: UniversityId, now: Instant) {
        self.cell_queue.enqueue(id, now);
    }

    pub fn enqueue_detail_refresh(&mut self, id: UniversityId, now: Instant) {
        self.detail_queue.enqueue(id, now);
    }

    /// Queue both a detail and a cell refresh for each id.
    pub fn enqueue_refresh(&mut self, ids: Vec<UniversityId>, now: Instant) {
        for id in ids {
            self.detail_queue.enqueue(id.clone(), now);
            self.cell_queue.enqueue(id, now);
        }
    }

    /// Earliest armed batch deadline, for the driver's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.detail_queue.deadline(), self.cell_queue.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn take_due(&mut self, now: Instant) -> DueBatches {
        DueBatches {
            details: self.detail_queue.take_due(now),
            cells: self.cell_queue.take_due(now),
        }
    }

    // ========================================================================
    // CHANNEL + NOTIFICATIONS
    // ========================================================================

    pub fn set_channel_up(&mut self, up: bool) {
        self.channel_up = up;
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push_back(Notification::new(level, message));
        while self.notifications.len() > self.config.notification_capacity {
            self.notifications.pop_front();
        }
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    pub fn snapshot(&self) -> GridSnapshot {
        let (visible, hidden_count) = visible_slice(&self.universities, &self.policy);
        let rows = materialize(visible, self.columns.list(), &self.cells, &self.processing);
        GridSnapshot {
            rows: Arc::from(rows),
            hidden_count,
            channel_up: self.channel_up,
            notifications: self.notifications.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniboard_core::{PushEvent, UniversityUpdate};

    const ME: &str = "me@example.com";

    fn university(id: &str) -> University {
        University {
            id: UniversityId::new(id),
            name: format!("University {id}"),
            url: format!("https://{id}.edu"),
            programs: Vec::new(),
            status: UniversityStatus::Pending,
            last_updated: None,
        }
    }

    fn engine_with(count: usize, policy: VisibilityPolicy) -> GridEngine {
        let mut engine = GridEngine::new(EngineConfig::new(ME), policy);
        engine.load_universities((1..=count).map(|i| university(&format!("u{i}"))).collect());
        engine
    }

    fn all_visible() -> VisibilityPolicy {
        VisibilityPolicy::new(SubscriptionStatus::Active, false)
    }

    fn capped() -> VisibilityPolicy {
        VisibilityPolicy::new(SubscriptionStatus::Expired, false)
    }

    fn column_processed(university: &str, column: &str, value: &str) -> PushEvent {
        PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new(university),
            status: Some(UniversityStatus::ColumnProcessed),
            column_id: Some(ColumnId::new(column)),
            value: Some(value.to_string()),
            user_email: ME.to_string(),
        })
    }

    #[test]
    fn test_direct_apply_is_idempotent() {
        let mut engine = engine_with(2, all_visible());
        engine
            .register_column(Column::user("c1", "Deadline", ME))
            .unwrap();

        let event = column_processed("u1", "c1", "Jan 15");
        let now = Instant::now();
        engine.ingest(&event, now);
        let first = engine.cells().get(&CellKey::new("u1", "c1")).clone();
        engine.ingest(&event, now);
        let second = engine.cells().get(&CellKey::new("u1", "c1")).clone();

        assert!(!first.loading);
        assert_eq!(first.value.as_deref(), Some("Jan 15"));
        assert_eq!(first.value, second.value);
        assert_eq!(first.loading, second.loading);
    }

    #[test]
    fn test_direct_apply_to_unregistered_column_is_dropped() {
        let mut engine = engine_with(1, all_visible());
        let event = column_processed("u1", "ghost", "x");
        engine.ingest(&event, Instant::now());
        assert!(engine.cells().get(&CellKey::new("u1", "ghost")).is_vacant());
        assert!(engine.cells().is_empty());
    }

    #[test]
    fn test_terminal_event_clears_loading() {
        let mut engine = engine_with(1, all_visible());
        engine
            .register_column(Column::user("c1", "Deadline", ME))
            .unwrap();
        engine.mark_new_column_loading(&ColumnId::new("c1"));
        assert!(engine.cells().get(&CellKey::new("u1", "c1")).loading);

        let event = PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new("u1"),
            status: Some(UniversityStatus::Failed),
            column_id: None,
            value: None,
            user_email: ME.to_string(),
        });
        engine.ingest(&event, Instant::now());

        let state = engine.cells().get(&CellKey::new("u1", "c1"));
        assert!(!state.loading);
        assert!(state.value.is_none());
    }

    #[test]
    fn test_cross_user_event_changes_nothing() {
        let mut engine = engine_with(1, all_visible());
        engine
            .register_column(Column::user("c1", "Deadline", ME))
            .unwrap();
        let event = PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new("u1"),
            status: Some(UniversityStatus::ColumnProcessed),
            column_id: Some(ColumnId::new("c1")),
            value: Some("leak".to_string()),
            user_email: "other@x.com".to_string(),
        });
        engine.ingest(&event, Instant::now());
        assert!(engine.cells().is_empty());
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn test_bare_update_arms_cell_queue() {
        let mut engine = engine_with(1, all_visible());
        let event = PushEvent::UniversityUpdate(UniversityUpdate {
            university_id: UniversityId::new("u1"),
            status: None,
            column_id: None,
            value: None,
            user_email: ME.to_string(),
        });
        let now = Instant::now();
        engine.ingest(&event, now);

        assert!(engine.next_deadline().is_some());
        let due = engine.take_due(now + CELL_DEBOUNCE);
        assert_eq!(due.cells, Some(vec![UniversityId::new("u1")]));
        assert!(due.details.is_none());
    }

    #[test]
    fn test_policy_downgrade_purges_hidden_cells() {
        let mut engine = engine_with(5, all_visible());
        engine
            .register_column(Column::user("c1", "Deadline", ME))
            .unwrap();
        for i in 1..=5 {
            let version = engine.begin_write();
            engine.commit_cell(
                &UniversityId::new(format!("u{i}")),
                &ColumnId::new("c1"),
                Some("v".to_string()),
                version,
                None,
            );
        }

        let revealed = engine.set_policy(capped());
        assert!(revealed.is_empty());
        assert_eq!(engine.hidden_count(), 2);
        assert!(engine.cells().get(&CellKey::new("u4", "c1")).is_vacant());
        assert!(engine.cells().get(&CellKey::new("u5", "c1")).is_vacant());
        assert_eq!(
            engine.cells().get(&CellKey::new("u1", "c1")).value.as_deref(),
            Some("v")
        );
    }

    #[test]
    fn test_reactivation_reveals_and_queues_only_new_ids() {
        let mut engine = engine_with(5, capped());
        assert_eq!(engine.visible_universities().len(), 3);

        let event = PushEvent::UserUpdate(uniboard_core::UserUpdate {
            kind: uniboard_core::UserUpdateKind::SubscriptionReactivated,
            university_ids: None,
            hidden_universities_count: Some(2),
            user_email: ME.to_string(),
        });
        let now = Instant::now();
        engine.ingest(&event, now);

        assert_eq!(engine.visible_universities().len(), 5);
        assert_eq!(engine.hidden_count(), 0);
        let due = engine.take_due(now + CELL_DEBOUNCE);
        let expected = vec![UniversityId::new("u4"), UniversityId::new("u5")];
        assert_eq!(due.details, Some(expected.clone()));
        assert_eq!(due.cells, Some(expected));
    }

    #[test]
    fn test_commit_to_hidden_row_is_noop() {
        let mut engine = engine_with(5, capped());
        engine
            .register_column(Column::user("c1", "Deadline", ME))
            .unwrap();
        let version = engine.begin_write();
        let committed = engine.commit_cell(
            &UniversityId::new("u5"),
            &ColumnId::new("c1"),
            Some("v".to_string()),
            version,
            None,
        );
        assert!(!committed);
        assert!(engine.cells().is_empty());
    }
}
