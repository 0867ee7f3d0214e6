pub mod error;
pub mod messages;
pub mod poll;
pub mod quick_replies;
pub mod relay;
pub mod rooms;

use std::sync::Arc;

use tracing::error;

use courier_db::{Database, StoreError};
use courier_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    /// Shared secret expected on `/internal/relay` calls. Empty disables the
    /// surface: every call is rejected as unauthenticated.
    pub relay_secret: String,
}

/// Run a store operation off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal("task join error".into())
        })?
        .map_err(ApiError::from)
}
