//! REST client for the grid API.

use std::time::Duration;

use gridedit_core::StoreError;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::store::RemoteGridStore;

/// Grid API client (async)
#[derive(Clone)]
pub struct HttpGridStore {
    http: Client,
    api_base: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct UpdateCellRequest<'a> {
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl HttpGridStore {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder()
            .user_agent(format!("gridedit/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, StoreError> {
        Self::new(config.api_url.clone(), config.sync_timeout)
    }

    fn document_url(&self, document_id: Uuid) -> String {
        format!("{}/api/documents/{}", self.api_base, document_id)
    }

    fn transport(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.timeout.as_millis() as u64)
        } else {
            StoreError::Transport(err.to_string())
        }
    }

    /// Turn non-2xx responses into `StoreError::Http`
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        Err(StoreError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

impl RemoteGridStore for HttpGridStore {
    async fn fetch_snapshot(&self, document_id: Uuid) -> Result<Vec<Vec<String>>, StoreError> {
        let response = self
            .http
            .get(self.document_url(document_id))
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let snapshot: SnapshotResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(snapshot.rows)
    }

    async fn update_cell(
        &self,
        document_id: Uuid,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), StoreError> {
        let url = format!("{}/cells/{}/{}", self.document_url(document_id), row, col);
        let response = self
            .http
            .put(url)
            .json(&UpdateCellRequest { value: &value })
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete_column(&self, document_id: Uuid, col: usize) -> Result<(), StoreError> {
        let url = format!("{}/columns/{}", self.document_url(document_id), col);
        let response = self.http.delete(url).send().await.map_err(|e| self.transport(e))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn add_row(&self, document_id: Uuid) -> Result<(), StoreError> {
        let url = format!("{}/rows", self.document_url(document_id));
        let response = self.http.post(url).send().await.map_err(|e| self.transport(e))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn add_column(&self, document_id: Uuid) -> Result<(), StoreError> {
        let url = format!("{}/columns", self.document_url(document_id));
        let response = self.http.post(url).send().await.map_err(|e| self.transport(e))?;

        Self::check(response).await?;
        Ok(())
    }
}
