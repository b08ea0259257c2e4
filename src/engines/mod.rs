// Database engine adapters for tenant database provisioning.
//
// Each supported flavour implements `DatabaseEngine` against an administrative
// endpoint. Low-level driver errors never cross this boundary: every operation
// reports a plain success flag, and only the tenant probe connection surfaces
// a typed `EngineError` so the caller can treat it as "unreachable".

pub mod mysql;
pub mod postgres;
pub mod registry;

pub use mysql::MysqlEngine;
pub use postgres::PostgresEngine;
pub use registry::{EngineBinding, EngineRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    Mysql,
    Postgres,
}

impl Flavour {
    pub const ALL: [Flavour; 2] = [Flavour::Mysql, Flavour::Postgres];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavour::Mysql => "mysql",
            Flavour::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Flavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavour {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Flavour::Mysql),
            "postgres" => Ok(Flavour::Postgres),
            other => Err(EngineError::UnknownFlavour(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown database flavour: {0}")]
    UnknownFlavour(String),

    #[error("Identifier is not safe for DDL: {0}")]
    UnsafeIdentifier(String),

    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Statement failed ({statement}): {source}")]
    Statement {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database {0} does not exist")]
    MissingDatabase(String),
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout(_))
    }
}

/// A failed create sequence and how many of its statements may have taken effect.
/// A timed-out statement was only cancelled client-side, so it counts as applied.
#[derive(Debug)]
pub(crate) struct CreateFailure {
    pub error: EngineError,
    pub applied: usize,
}

impl CreateFailure {
    /// `completed` statements succeeded before `error`
    pub(crate) fn at_step(error: EngineError, completed: usize) -> Self {
        let applied = if error.is_timeout() { completed + 1 } else { completed };
        Self { error, applied }
    }

    /// Failure before any creating statement ran
    pub(crate) fn before_create(error: EngineError) -> Self {
        Self { error, applied: 0 }
    }
}

/// A live connection opened with tenant credentials. Must be closed by the holder.
#[async_trait]
pub trait TenantConnection: Send {
    async fn close(self: Box<Self>);
}

/// Flavour-agnostic contract every engine adapter implements
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    fn flavour(&self) -> Flavour;

    /// Open and close an administrative connection. False on any failure.
    async fn check_connection(&self) -> bool;

    /// Create a database and a login with full privileges on it.
    /// Either both exist afterwards or neither does.
    async fn create_database(&self, name: &str, user: &str, password: &str) -> bool;

    /// Drop a database (and its owning login where the engine couples them).
    /// A missing database is reported as failure.
    async fn delete_database(&self, name: &str) -> bool;

    /// Drop and recreate the database and login with the same credentials.
    async fn reset_database(&self, name: &str, user: &str, password: &str) -> bool;

    /// Connect as the tenant. The returned connection must be closed by the caller.
    async fn create_db_connection(
        &self,
        user: &str,
        password: &str,
        db_name: &str,
    ) -> Result<Box<dyn TenantConnection>, EngineError>;
}

/// Maximum identifier length accepted for database names (PostgreSQL's NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Identifier-safe: ASCII letter or underscore first, then ASCII alphanumerics or underscores.
pub fn is_identifier_safe(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn ensure_identifier(name: &str) -> Result<&str, EngineError> {
    if is_identifier_safe(name) {
        Ok(name)
    } else {
        Err(EngineError::UnsafeIdentifier(name.to_string()))
    }
}

/// Bound an engine future, mapping elapsed time to `EngineError::Timeout`
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, EngineError>
where
    F: std::future::Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(limit)),
    }
}
