pub mod messages;
pub mod reactions;
pub mod rooms;

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use banter_gateway::dispatcher::Dispatcher;
use banter_store::{Store, StoreError};

/// Shared state handed to every REST handler.
pub struct AppStateInner {
    pub store: Arc<Store>,
    pub dispatcher: Dispatcher,
}

pub type AppState = Arc<AppStateInner>;

/// Map store failures onto HTTP status codes. Conflicts surface as 409,
/// missing targets as 404, anything else is a server fault.
pub(crate) fn store_status(err: StoreError) -> StatusCode {
    match err {
        StoreError::DuplicateRoom(_) | StoreError::AmbiguousReference { .. } => {
            StatusCode::CONFLICT
        }
        StoreError::RoomNotFound(_) | StoreError::MessageNotFound { .. } => StatusCode::NOT_FOUND,
        err => {
            error!("Store failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run one store call off the async runtime. Every store operation holds the
/// map lock, and mutations rewrite the whole file under it, so none of them
/// belong on a tokio worker thread.
pub(crate) async fn run_store<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> banter_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(store_status)
}
