//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool and the read-only server configuration. All
//! inventory state lives in Postgres; nothing is cached in memory.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the pool is internally reference counted.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        Self { pool, config: Arc::new(config) }
    }

    /// Threshold used by `/low-stock` when the request omits one.
    #[must_use]
    pub fn default_low_stock_threshold(&self) -> i32 {
        self.config.low_stock_threshold
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
