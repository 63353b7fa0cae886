use crate::config::SharedSettings;
use crate::index::IndexManager;
use crate::progress::ProgressTrackers;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: SharedSettings,
    pub db: SqlitePool,
    pub index: Arc<IndexManager>,
    pub trackers: Arc<ProgressTrackers>,
}
