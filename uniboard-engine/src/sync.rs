//! Grid driver: the single-owner event loop around [`GridEngine`].
//!
//! The driver task receives push-channel events and user commands over
//! `mpsc` channels, fires due batches off its own timer, and publishes an
//! immutable [`GridSnapshot`] over a `watch` channel after every mutation.
//! Spawned network operations report back through an internal results
//! channel instead of touching state themselves.

use crate::backend::{BackendError, GridBackend};
use crate::engine::{EngineConfig, GridEngine, GridSnapshot};
use crate::lifecycle;
use crate::notifications::NotificationLevel;
use crate::visibility::VisibilityPolicy;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uniboard_core::{
    BatchCellData, Column, ColumnId, PushEvent, University, UniversityId, UserIdentity,
};

/// Events produced by the push-channel manager.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Push(PushEvent),
    /// Connection established. `resumed` is true after a drop, in which
    /// case the driver schedules a full refresh to bound staleness.
    ChannelUp { resumed: bool },
    ChannelDown { reason: String },
    /// Reconnect attempts are exhausted; no more events will arrive.
    ChannelLapsed { attempts: u32 },
}

/// User-initiated grid operations.
#[derive(Debug, Clone)]
pub enum GridCommand {
    LoadUniversities(Vec<University>),
    LoadColumns(Vec<Column>),
    AddColumn {
        title: String,
    },
    RemoveColumn {
        column_id: ColumnId,
        user: UserIdentity,
    },
    EditCell {
        university_id: UniversityId,
        column_id: ColumnId,
        value: String,
    },
    RefreshUniversity {
        university_id: UniversityId,
    },
    SetPolicy(VisibilityPolicy),
    Shutdown,
}

/// Completions reported by spawned network operations.
#[derive(Debug)]
pub(crate) enum TaskResult {
    CellBatch {
        ids: Vec<UniversityId>,
        version: u64,
        result: Result<BatchCellData, BackendError>,
    },
    DetailBatch {
        ids: Vec<UniversityId>,
        result: Result<Vec<University>, BackendError>,
    },
    CellSaved {
        university_id: UniversityId,
        column_id: ColumnId,
        value: String,
        version: u64,
        result: Result<(), BackendError>,
    },
    BackfillCell {
        university_id: UniversityId,
        column_id: ColumnId,
        value: String,
        version: u64,
    },
    BackfillRowFailed {
        university_id: UniversityId,
        column_id: ColumnId,
    },
    BackfillFinished {
        column_id: ColumnId,
        completed: usize,
        failed: usize,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("grid driver is no longer running")]
pub struct DriverClosed;

/// Cloneable handle for sending commands to a running driver.
#[derive(Clone)]
pub struct GridHandle {
    commands: mpsc::Sender<GridCommand>,
}

impl GridHandle {
    pub async fn send(&self, command: GridCommand) -> Result<(), DriverClosed> {
        self.commands.send(command).await.map_err(|_| DriverClosed)
    }

    pub async fn load_universities(&self, universities: Vec<University>) -> Result<(), DriverClosed> {
        self.send(GridCommand::LoadUniversities(universities)).await
    }

    pub async fn load_columns(&self, columns: Vec<Column>) -> Result<(), DriverClosed> {
        self.send(GridCommand::LoadColumns(columns)).await
    }

    pub async fn add_column(&self, title: impl Into<String>) -> Result<(), DriverClosed> {
        self.send(GridCommand::AddColumn {
            title: title.into(),
        })
        .await
    }

    pub async fn remove_column(
        &self,
        column_id: ColumnId,
        user: UserIdentity,
    ) -> Result<(), DriverClosed> {
        self.send(GridCommand::RemoveColumn { column_id, user }).await
    }

    pub async fn edit_cell(
        &self,
        university_id: UniversityId,
        column_id: ColumnId,
        value: impl Into<String>,
    ) -> Result<(), DriverClosed> {
        self.send(GridCommand::EditCell {
            university_id,
            column_id,
            value: value.into(),
        })
        .await
    }

    pub async fn refresh_university(&self, university_id: UniversityId) -> Result<(), DriverClosed> {
        self.send(GridCommand::RefreshUniversity { university_id })
            .await
    }

    pub async fn set_policy(&self, policy: VisibilityPolicy) -> Result<(), DriverClosed> {
        self.send(GridCommand::SetPolicy(policy)).await
    }

    pub async fn shutdown(&self) -> Result<(), DriverClosed> {
        self.send(GridCommand::Shutdown).await
    }
}

/// The driver itself. Construct with [`GridSync::new`], then `await`
/// [`GridSync::run`] (usually inside `tokio::spawn`).
pub struct GridSync<B> {
    engine: GridEngine,
    backend: Arc<B>,
    commands_rx: mpsc::Receiver<GridCommand>,
    events_rx: mpsc::Receiver<SyncEvent>,
    results_rx: mpsc::Receiver<TaskResult>,
    results_tx: mpsc::Sender<TaskResult>,
    snapshot_tx: watch::Sender<GridSnapshot>,
    // Keeps the events channel open even after the push manager exits.
    _events_tx: mpsc::Sender<SyncEvent>,
}

impl<B: GridBackend + 'static> GridSync<B> {
    #[allow(clippy::type_complexity)]
    pub fn new(
        config: EngineConfig,
        policy: VisibilityPolicy,
        backend: Arc<B>,
    ) -> (
        Self,
        GridHandle,
        mpsc::Sender<SyncEvent>,
        watch::Receiver<GridSnapshot>,
    ) {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(256);
        let (results_tx, results_rx) = mpsc::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(GridSnapshot::empty());

        let sync = Self {
            engine: GridEngine::new(config, policy),
            backend,
            commands_rx,
            events_rx,
            results_rx,
            results_tx,
            snapshot_tx,
            _events_tx: events_tx.clone(),
        };
        let handle = GridHandle {
            commands: commands_tx,
        };
        (sync, handle, events_tx, snapshot_rx)
    }

    pub async fn run(mut self) {
        self.publish();
        loop {
            let deadline = self.engine.next_deadline();
            tokio::select! {
                command = self.commands_rx.recv() => match command {
                    None | Some(GridCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_sync_event(event),
                Some(result) = self.results_rx.recv() => self.handle_result(result),
                _ = wait_until(deadline) => self.fire_due(Instant::now()),
            }
            self.publish();
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.engine.snapshot());
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    async fn handle_command(&mut self, command: GridCommand) {
        match command {
            GridCommand::LoadUniversities(universities) => {
                self.engine.load_universities(universities);
            }
            GridCommand::LoadColumns(columns) => self.engine.load_columns(columns),
            GridCommand::AddColumn { title } => self.add_column(title).await,
            GridCommand::RemoveColumn { column_id, user } => {
                self.remove_column(column_id, user).await;
            }
            GridCommand::EditCell {
                university_id,
                column_id,
                value,
            } => self.edit_cell(university_id, column_id, value),
            GridCommand::RefreshUniversity { university_id } => {
                self.engine.enqueue_refresh(vec![university_id], Instant::now());
            }
            GridCommand::SetPolicy(policy) => {
                let revealed = self.engine.set_policy(policy);
                self.engine.enqueue_refresh(revealed, Instant::now());
            }
            // Shutdown is intercepted by the run loop.
            GridCommand::Shutdown => {}
        }
    }

    async fn add_column(&mut self, title: String) {
        match self.backend.create_column(&title).await {
            Ok(column) => {
                let column_id = column.id.clone();
                let column_title = column.title.clone();
                if let Err(err) = self.engine.register_column(column) {
                    warn!(%err, "created column could not be registered");
                    return;
                }
                // Loading flags go up before any retrieval starts so the
                // grid shows "computing" instead of blank cells.
                let targets = self.engine.mark_new_column_loading(&column_id);
                let version = self.engine.begin_write();
                info!(%column_id, rows = targets.len(), "column created, starting backfill");
                tokio::spawn(lifecycle::run_backfill(
                    Arc::clone(&self.backend),
                    self.results_tx.clone(),
                    column_id,
                    column_title,
                    targets,
                    version,
                ));
            }
            Err(error) => {
                warn!(%error, "column creation failed");
                self.engine.notify(
                    NotificationLevel::Error,
                    format!("Creating column failed: {error}"),
                );
            }
        }
    }

    async fn remove_column(&mut self, column_id: ColumnId, user: UserIdentity) {
        // Ownership check happens before any store mutation or network call.
        if let Err(err) = self.engine.authorize_remove_column(&column_id, &user) {
            self.engine.notify(NotificationLevel::Warning, err.to_string());
            return;
        }
        match self.backend.delete_column(&column_id).await {
            Ok(()) => {
                if self.engine.purge_column(&column_id).is_ok() {
                    info!(%column_id, "column deleted");
                    self.engine.notify(NotificationLevel::Success, "Column deleted");
                }
            }
            Err(error) => {
                warn!(%error, %column_id, "column deletion failed");
                self.engine.notify(
                    NotificationLevel::Error,
                    format!("Deleting column failed: {error}"),
                );
            }
        }
    }

    fn edit_cell(&mut self, university_id: UniversityId, column_id: ColumnId, value: String) {
        let version = self.engine.begin_write();
        let backend = Arc::clone(&self.backend);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let result = backend
                .save_cell_value(&university_id, &column_id, &value)
                .await;
            let _ = results
                .send(TaskResult::CellSaved {
                    university_id,
                    column_id,
                    value,
                    version,
                    result,
                })
                .await;
        });
    }

    // ========================================================================
    // PUSH CHANNEL
    // ========================================================================

    fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Push(push) => self.engine.ingest(&push, Instant::now()),
            SyncEvent::ChannelUp { resumed } => {
                self.engine.set_channel_up(true);
                if resumed {
                    // The channel has no replay; bound staleness by
                    // refreshing everything visible after a gap.
                    let ids: Vec<UniversityId> = self
                        .engine
                        .visible_universities()
                        .iter()
                        .map(|u| u.id.clone())
                        .collect();
                    info!(count = ids.len(), "push channel resumed, scheduling full refresh");
                    self.engine.enqueue_refresh(ids, Instant::now());
                }
            }
            SyncEvent::ChannelDown { reason } => {
                self.engine.set_channel_up(false);
                self.engine.notify(
                    NotificationLevel::Warning,
                    format!("Live updates disconnected: {reason}"),
                );
            }
            SyncEvent::ChannelLapsed { attempts } => {
                self.engine.set_channel_up(false);
                error!(attempts, "push channel gave up reconnecting");
                self.engine.notify(
                    NotificationLevel::Error,
                    "Live updates unavailable; refresh manually",
                );
            }
        }
    }

    // ========================================================================
    // BATCHES AND TASK RESULTS
    // ========================================================================

    fn fire_due(&mut self, now: Instant) {
        let due = self.engine.take_due(now);
        if let Some(ids) = due.details {
            info!(count = ids.len(), "dispatching university detail batch");
            let backend = Arc::clone(&self.backend);
            let results = self.results_tx.clone();
            tokio::spawn(async move {
                let result = backend.fetch_university_details(&ids).await;
                let _ = results.send(TaskResult::DetailBatch { ids, result }).await;
            });
        }
        if let Some(ids) = due.cells {
            let version = self.engine.begin_write();
            info!(count = ids.len(), "dispatching cell data batch");
            let backend = Arc::clone(&self.backend);
            let results = self.results_tx.clone();
            tokio::spawn(async move {
                let result = backend.fetch_cell_batch(&ids).await;
                let _ = results
                    .send(TaskResult::CellBatch {
                        ids,
                        version,
                        result,
                    })
                    .await;
            });
        }
    }

    fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::CellBatch {
                result: Ok(data),
                version,
                ..
            } => {
                // Ids absent from the response stay as they were; absence
                // is not a failure.
                for (university_id, columns) in data {
                    for (column_id, datum) in columns {
                        self.engine.commit_cell(
                            &university_id,
                            &column_id,
                            datum.value,
                            version,
                            datum.last_updated,
                        );
                    }
                }
            }
            TaskResult::CellBatch {
                result: Err(error),
                ids,
                ..
            } => {
                warn!(%error, count = ids.len(), "cell batch fetch failed; cells keep their prior state");
                self.engine
                    .notify(NotificationLevel::Error, "Refreshing cell data failed");
            }
            TaskResult::DetailBatch {
                result: Ok(universities),
                ..
            } => self.engine.merge_details(universities),
            TaskResult::DetailBatch {
                result: Err(error),
                ids,
            } => {
                warn!(%error, count = ids.len(), "detail batch fetch failed");
                self.engine.notify(
                    NotificationLevel::Error,
                    "Refreshing university details failed",
                );
            }
            TaskResult::CellSaved {
                university_id,
                column_id,
                value,
                version,
                result,
            } => match result {
                Ok(()) => {
                    self.engine.commit_cell(
                        &university_id,
                        &column_id,
                        Some(value),
                        version,
                        Some(Utc::now()),
                    );
                }
                Err(error) => {
                    warn!(%error, %university_id, %column_id, "cell save failed");
                    self.engine
                        .notify(NotificationLevel::Error, "Saving cell failed");
                }
            },
            TaskResult::BackfillCell {
                university_id,
                column_id,
                value,
                version,
            } => {
                self.engine.commit_cell(
                    &university_id,
                    &column_id,
                    Some(value),
                    version,
                    Some(Utc::now()),
                );
            }
            TaskResult::BackfillRowFailed {
                university_id,
                column_id,
            } => {
                self.engine.clear_cell_loading(&university_id, &column_id);
            }
            TaskResult::BackfillFinished {
                column_id: _,
                completed,
                failed,
            } => {
                if failed == 0 {
                    self.engine.notify(
                        NotificationLevel::Success,
                        format!("Column backfill complete ({completed} rows)"),
                    );
                } else {
                    self.engine.notify(
                        NotificationLevel::Warning,
                        format!("Column backfill finished with {failed} failed rows"),
                    );
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
