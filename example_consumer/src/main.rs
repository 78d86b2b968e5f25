//! Example consumer: a small service wired from weblite-framework pieces.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Needs `DATABASE_URL` (a `.env` file works too).

use tokio::net::TcpListener;
use weblite_framework::{
    health_routes, load_dotenv, logging, AppState, DatabaseSettings, HealthService, LogSettings,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();
    let _log_guard = logging::init(&LogSettings::from_env())?;

    let db = DatabaseSettings::from_env()?;
    let pool = db.connect().await?;
    let state = AppState::new(pool);

    if let Err(e) = HealthService::new(state.session()).check_db_connection().await {
        tracing::warn!(error = %e, "starting with database unavailable");
    }

    let app = health_routes(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
