//! Contract with the backend that owns the authoritative grid.

use std::future::Future;
use std::time::Duration;

use gridedit_core::StoreError;
use uuid::Uuid;

/// Backend snapshot fetch and per-cell/per-column persistence.
///
/// Futures must be `Send` so calls can run as background tasks while the
/// session keeps serving the UI.
pub trait RemoteGridStore: Send + Sync + 'static {
    fn fetch_snapshot(
        &self,
        document_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Vec<String>>, StoreError>> + Send;

    fn update_cell(
        &self,
        document_id: Uuid,
        row: usize,
        col: usize,
        value: String,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_column(
        &self,
        document_id: Uuid,
        col: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Optional; only called when structural sync is enabled
    fn add_row(&self, _document_id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }

    /// Optional; only called when structural sync is enabled
    fn add_column(
        &self,
        _document_id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }
}

/// Bound a store call by `limit`
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit.as_millis() as u64)),
    }
}
