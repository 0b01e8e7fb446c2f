use std::sync::Arc;

use sqlx::PgPool;

use crate::{config::AppConfig, db};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = match config.database_url.as_deref() {
            Some(url) => Some(db::build_pool(&config, url)?),
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            db_pool,
        })
    }
}
