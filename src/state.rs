//! Shared application state for the Axum router.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::{SettingsStore, UploadStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<SettingsStore>,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        Self {
            settings: Arc::new(SettingsStore::new(pool.clone())),
            uploads: UploadStore::new(&config.uploads),
            pool,
        }
    }
}
