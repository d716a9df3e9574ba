use crate::notify::NotifyBus;
use sandbox_session::SessionManager;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles every handler needs. Cheap to clone — everything inside
/// is already an `Arc` or a `sqlx` pool (itself a cheap-clone connection set).
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionManager>,
    pub notify: Arc<NotifyBus>,
}
