//! Shared application state for routes.

use crate::session::PgSession;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        AppState { pool }
    }

    /// A fresh session for one request.
    pub fn session(&self) -> PgSession {
        PgSession::new(self.pool.clone())
    }
}
