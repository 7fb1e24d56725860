//! Shared state for API handlers.

use std::sync::Arc;

use attend_core::{AttendanceEngine, PresencePercent};
use attend_db::{Database, SqliteStore};
use tokio::task;

use super::error::ApiError;

/// The engine and the settings handlers need, shared across requests.
pub struct AppState {
    pub engine: AttendanceEngine<SqliteStore>,
    /// Presence percent for events created without one.
    pub default_percent: PresencePercent,
}

impl AppState {
    pub const fn new(engine: AttendanceEngine<SqliteStore>, default_percent: PresencePercent) -> Self {
        Self {
            engine,
            default_percent,
        }
    }

    /// Runs blocking engine or database work off the async runtime.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, ApiError> + Send + 'static,
    {
        let state = Arc::clone(self);
        task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| ApiError::Internal(format!("worker failed: {e}")))?
    }

    /// Runs `f` with exclusive use of the database connection.
    pub async fn with_db<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T, ApiError> + Send + 'static,
    {
        self.blocking(move |state| f(&mut state.engine.store().lock()))
            .await
    }
}
