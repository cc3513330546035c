use crate::api::Pool;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::RunQueryDsl;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_JWT_TTL_HOURS: i64 = 24;
pub const DEFAULT_POOL_MAX_SIZE: u32 = 10;
pub const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub statement_timeout: Duration,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub pool: PoolConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Reads the configuration from the process environment, after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            pool: PoolConfig {
                max_size: parse_or(&lookup, "DB_POOL_MAX_SIZE", DEFAULT_POOL_MAX_SIZE)?,
                connection_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "DB_POOL_TIMEOUT_SECS",
                    DEFAULT_POOL_TIMEOUT_SECS,
                )?),
                statement_timeout: Duration::from_millis(parse_or(
                    &lookup,
                    "DB_STATEMENT_TIMEOUT_MS",
                    DEFAULT_STATEMENT_TIMEOUT_MS,
                )?),
            },
            auth: AuthConfig {
                jwt_secret: required("JWT_SECRET")?,
                jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", DEFAULT_JWT_TTL_HOURS)?,
                bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
        })
    }

    pub fn build_pool(&self) -> Result<Pool, r2d2::PoolError> {
        let manager = ConnectionManager::<PgConnection>::new(&self.database_url);
        r2d2::Pool::builder()
            .max_size(self.pool.max_size)
            .connection_timeout(self.pool.connection_timeout)
            .connection_customizer(Box::new(StatementTimeout(self.pool.statement_timeout)))
            .build(manager)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Bounds every statement run on a pooled connection.
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(r2d2::Error::QueryError)
    }
}
