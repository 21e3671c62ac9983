use std::sync::Arc;

use crate::config::AppConfig;
use crate::security::sanitizer::{ContentSanitizer, HtmlPurifier};
use crate::shared::utils::DbPool;

pub struct AppState {
    pub config: Option<AppConfig>,
    pub conn: DbPool,
    pub sanitizer: Arc<dyn ContentSanitizer>,
}

impl AppState {
    pub fn new(conn: DbPool, config: Option<AppConfig>) -> Self {
        Self {
            config,
            conn,
            sanitizer: Arc::new(HtmlPurifier::new()),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn ContentSanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("pool_max_size", &self.conn.max_size())
            .finish_non_exhaustive()
    }
}
