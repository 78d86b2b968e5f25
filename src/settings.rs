//! Typed settings read from the environment (and `.env` when loaded).

use crate::error::{AppError, ConfigError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Load `.env` from the working directory if present. Existing variables win.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn parsed<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
                name: name.to_string(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn seconds<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parsed(lookup, name, default.as_secs_f64())?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::InvalidVar {
            name: name.to_string(),
            reason: "must be a positive number of seconds".into(),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidVar {
                name: "DATABASE_MAX_CONNECTIONS".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(DatabaseSettings {
            url: required(&lookup, "DATABASE_URL")?,
            max_connections,
        })
    }

    pub async fn connect(&self) -> Result<PgPool, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await?;
        tracing::info!(max_connections = self.max_connections, "database pool ready");
        Ok(pool)
    }
}

/// Object storage settings. `endpoint_url` targets S3-compatible services such as MinIO.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub path_style: bool,
    pub max_attempts: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl S3Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_attempts = parsed(&lookup, "S3_MAX_ATTEMPTS", 3u32)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidVar {
                name: "S3_MAX_ATTEMPTS".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(S3Settings {
            bucket: required(&lookup, "S3_BUCKET")?,
            access_key: required(&lookup, "S3_ACCESS_KEY")?,
            secret_key: required(&lookup, "S3_SECRET_KEY")?,
            region: lookup("S3_REGION")
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "us-east-1".to_string()),
            endpoint_url: lookup("S3_ENDPOINT_URL").filter(|u| !u.trim().is_empty()),
            path_style: parsed(&lookup, "S3_PATH_STYLE", false)?,
            max_attempts,
            connect_timeout: seconds(&lookup, "S3_CONNECT_TIMEOUT", Duration::from_secs(5))?,
            read_timeout: seconds(&lookup, "S3_READ_TIMEOUT", Duration::from_secs(30))?,
        })
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("path_style", &self.path_style)
            .field("max_attempts", &self.max_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// `RUST_LOG` style filter directives.
#[derive(Clone, Debug)]
pub struct LogSettings {
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            filter: "info".into(),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("RUST_LOG") {
            Some(filter) if !filter.trim().is_empty() => LogSettings { filter },
            _ => LogSettings::default(),
        }
    }
}
