//! REST client for the dashboard API.
//!
//! Thin wrappers over the consumed endpoints plus the [`GridBackend`]
//! implementation the engine drives. Every response goes through one
//! `parse_response` path that surfaces the server's error body when there
//! is one.

use crate::config::ClientConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uniboard_core::{BatchCellData, Column, ColumnId, University, UniversityId};
use uniboard_engine::{BackendError, GridBackend};

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    Push(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Push(Box::new(err))
    }
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list_columns(&self) -> Result<Vec<Column>, ApiClientError> {
        self.get_json("/api/columns").await
    }

    pub async fn create_column(&self, name: &str) -> Result<Column, ApiClientError> {
        let response: CreateColumnResponse = self
            .post_json("/api/columns", &CreateColumnRequest { name })
            .await?;
        Ok(response.column)
    }

    pub async fn delete_column(&self, id: &ColumnId) -> Result<(), ApiClientError> {
        let url = format!("{}/api/columns/{}", self.base_url, id);
        let response = self.client.delete(url).send().await?;
        self.expect_success(response).await
    }

    pub async fn save_cell_value(
        &self,
        university_id: &UniversityId,
        column_id: &ColumnId,
        value: &str,
    ) -> Result<(), ApiClientError> {
        let url = format!("{}/api/columns/data", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&SaveCellRequest {
                university_id,
                column_id,
                value,
            })
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn fetch_cell_batch(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<BatchCellData, ApiClientError> {
        self.post_json(
            "/api/columns/data/batch",
            &BatchDataRequest { university_ids },
        )
        .await
    }

    pub async fn retrieve_answer(
        &self,
        question: &str,
        university_id: &UniversityId,
    ) -> Result<String, ApiClientError> {
        let response: RagResponse = self
            .post_json(
                "/api/rag",
                &RagRequest {
                    question,
                    university_id,
                },
            )
            .await?;
        Ok(response.answer)
    }

    pub async fn fetch_university_details(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<Vec<University>, ApiClientError> {
        self.post_json(
            "/api/universities/details",
            &DetailsRequest {
                universities: university_ids,
            },
        )
        .await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(url).send().await?;
        self.parse_response(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(url).json(body).send().await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(status_error(status.as_u16(), response.text().await?))
        }
    }

    /// For endpoints whose success body is empty (204 and friends).
    async fn expect_success(&self, response: reqwest::Response) -> Result<(), ApiClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status.as_u16(), response.text().await?))
        }
    }
}

fn status_error(status: u16, body: String) -> ApiClientError {
    let message = match serde_json::from_str::<ServerError>(&body) {
        Ok(server_error) => server_error.error,
        Err(_) => body,
    };
    ApiClientError::Status { status, message }
}

// ----------------------------------------------------------------------------
// Wire DTOs
// ----------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateColumnRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateColumnResponse {
    column: Column,
}

#[derive(Serialize)]
struct SaveCellRequest<'a> {
    university_id: &'a UniversityId,
    column_id: &'a ColumnId,
    value: &'a str,
}

#[derive(Serialize)]
struct BatchDataRequest<'a> {
    university_ids: &'a [UniversityId],
}

#[derive(Serialize)]
struct RagRequest<'a> {
    question: &'a str,
    university_id: &'a UniversityId,
}

#[derive(Deserialize)]
struct RagResponse {
    answer: String,
}

#[derive(Serialize)]
struct DetailsRequest<'a> {
    universities: &'a [UniversityId],
}

#[derive(Deserialize)]
struct ServerError {
    error: String,
}

// ----------------------------------------------------------------------------
// Engine backend seam
// ----------------------------------------------------------------------------

fn to_backend_error(endpoint: &str, err: ApiClientError) -> BackendError {
    match err {
        ApiClientError::Status { status, message } => BackendError::RequestFailed {
            endpoint: endpoint.to_string(),
            status,
            message,
        },
        ApiClientError::Serde(err) => BackendError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        },
        ApiClientError::Http(err) => BackendError::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        },
        ApiClientError::Push(err) => BackendError::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl GridBackend for RestClient {
    async fn list_columns(&self) -> Result<Vec<Column>, BackendError> {
        RestClient::list_columns(self)
            .await
            .map_err(|err| to_backend_error("/api/columns", err))
    }

    async fn create_column(&self, title: &str) -> Result<Column, BackendError> {
        RestClient::create_column(self, title)
            .await
            .map_err(|err| to_backend_error("/api/columns", err))
    }

    async fn delete_column(&self, id: &ColumnId) -> Result<(), BackendError> {
        RestClient::delete_column(self, id)
            .await
            .map_err(|err| to_backend_error("/api/columns/:id", err))
    }

    async fn save_cell_value(
        &self,
        university_id: &UniversityId,
        column_id: &ColumnId,
        value: &str,
    ) -> Result<(), BackendError> {
        RestClient::save_cell_value(self, university_id, column_id, value)
            .await
            .map_err(|err| to_backend_error("/api/columns/data", err))
    }

    async fn fetch_cell_batch(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<BatchCellData, BackendError> {
        RestClient::fetch_cell_batch(self, university_ids)
            .await
            .map_err(|err| to_backend_error("/api/columns/data/batch", err))
    }

    async fn retrieve_answer(
        &self,
        question: &str,
        university_id: &UniversityId,
    ) -> Result<String, BackendError> {
        RestClient::retrieve_answer(self, question, university_id)
            .await
            .map_err(|err| to_backend_error("/api/rag", err))
    }

    async fn fetch_university_details(
        &self,
        university_ids: &[UniversityId],
    ) -> Result<Vec<University>, BackendError> {
        RestClient::fetch_university_details(self, university_ids)
            .await
            .map_err(|err| to_backend_error("/api/universities/details", err))
    }
}
