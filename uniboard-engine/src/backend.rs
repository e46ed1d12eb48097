//! Backend seam for the synchronization engine.
//!
//! The engine never talks HTTP directly; everything network-bound goes
//! through [`GridBackend`]. The REST implementation lives in
//! `uniboard-client`, tests substitute their own.

use async_trait::async_trait;
use thiserror::Error;
use uniboard_core::{BatchCellData, Column, ColumnId, University, UniversityId};

/// Transport-level errors surfaced by a [`GridBackend`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request to {endpoint} failed with status {status}: {message}")]
    RequestFailed {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Transport error on {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Async backend operations consumed by the engine.
#[async_trait]
pub trait GridBackend: Send + Sync {
    // ========================================================================
    // COLUMN OPERATIONS
    // ========================================================================

    /// List the dynamic columns registered for this user.
    async fn list_columns(&self) -> Result<Vec<Column>, BackendError>;

    /// Create a new user column and return it with its server-assigned id.
    async fn create_column(&self, title: &str) -> Result<Column, BackendError>;

    /// Delete a column by id.
    async fn delete_column(&self, id: &ColumnId) -> Result<(), BackendError>;

    // ========================================================================
    // CELL OPERATIONS
    // ========================================================================

    /// Persist a single cell value.
    async fn save_cell_value(
        &self,
        university_id: &UniversityId,
        column_id: &ColumnId,
        value: &str,
    ) -> Result<(), BackendError>;

    /// Fetch cell data for a batch of universities in one round trip.
    async fn fetch_cell_batch(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<BatchCellData, BackendError>;

    // ========================================================================
    // RETRIEVAL AND DETAILS
    // ========================================================================

    /// Ask the retrieval backend a question about one university.
    async fn retrieve_answer(
        &self,
        question: &str,
        university_id: &UniversityId,
    ) -> Result<String, BackendError>;

    /// Bulk-fetch fresh entity snapshots.
    async fn fetch_university_details(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<Vec<University>, BackendError>;
}
