//! Weblite framework: base repositories, services, validators, errors and
//! logging for layered web backends on PostgreSQL.

pub mod error;
pub mod logging;
pub mod provider;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;

pub use error::{AppError, ConfigError, ServiceHealthError};
pub use logging::LogGuard;
pub use provider::S3Provider;
pub use repository::{BaseRepository, CommonRepo, GetById, ModelMapper};
pub use routes::health_routes;
pub use schema::{FieldSpec, Schema};
pub use service::{BaseService, HealthService, Overrides};
pub use session::{Entity, Model, PgSession, RecordState, Session};
pub use settings::{load_dotenv, DatabaseSettings, LogSettings, S3Settings};
pub use sql::Statement;
pub use state::AppState;
