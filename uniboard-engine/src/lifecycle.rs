//! Column lifecycle: backfill a newly created column across visible rows.
//!
//! The backfill runs as its own task so push events keep flowing while it
//! works, but rows go through a bounded-concurrency queue with a limit of
//! one: each row's retrieval completes before the next starts, bounding
//! load on the retrieval backend and giving a predictable completion
//! order. Raising the limit would not change the contract.

use crate::backend::{BackendError, GridBackend};
use crate::sync::TaskResult;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uniboard_core::{ColumnId, UniversityId};

pub const BACKFILL_CONCURRENCY: usize = 1;

/// One visible row awaiting a value for a freshly created column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillTarget {
    pub university_id: UniversityId,
    pub university_name: String,
}

/// Question posed to the retrieval backend for one (column, university).
pub fn synthesize_question(column_title: &str, university_name: &str) -> String {
    format!("What is the {} for {}?", column_title.trim(), university_name)
}

pub(crate) async fn run_backfill<B: GridBackend + 'static>(
    backend: Arc<B>,
    results: mpsc::Sender<TaskResult>,
    column_id: ColumnId,
    column_title: String,
    targets: Vec<BackfillTarget>,
    version: u64,
) {
    let total = targets.len();
    let mut completed = 0usize;
    let mut failed = 0usize;

    let mut outcomes = futures_util::stream::iter(targets.into_iter().map(|target| {
        let backend = Arc::clone(&backend);
        let column_id = column_id.clone();
        let question = synthesize_question(&column_title, &target.university_name);
        async move {
            let outcome =
                backfill_row(&*backend, &question, &target.university_id, &column_id).await;
            (target, outcome)
        }
    }))
    .buffered(BACKFILL_CONCURRENCY);

    while let Some((target, outcome)) = outcomes.next().await {
        let message = match outcome {
            Ok(value) => {
                completed += 1;
                TaskResult::BackfillCell {
                    university_id: target.university_id,
                    column_id: column_id.clone(),
                    value,
                    version,
                }
            }
            Err(error) => {
                failed += 1;
                warn!(%error, university = %target.university_id, "backfill row failed, continuing");
                TaskResult::BackfillRowFailed {
                    university_id: target.university_id,
                    column_id: column_id.clone(),
                }
            }
        };
        if results.send(message).await.is_err() {
            // Driver is gone; nothing left to report to.
            return;
        }
    }

    info!(%column_id, total, completed, failed, "column backfill finished");
    let _ = results
        .send(TaskResult::BackfillFinished {
            column_id: column_id.clone(),
            completed,
            failed,
        })
        .await;
}

/// Compute and persist one row's value. Failures here are isolated to the
/// row; the caller moves on to the next one.
async fn backfill_row<B: GridBackend>(
    backend: &B,
    question: &str,
    university_id: &UniversityId,
    column_id: &ColumnId,
) -> Result<String, BackendError> {
    let answer = backend.retrieve_answer(question, university_id).await?;
    backend
        .save_cell_value(university_id, column_id, &answer)
        .await?;
    Ok(answer)
}
