use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    ensure_identifier, with_timeout, CreateFailure, DatabaseEngine, EngineError, Flavour, TenantConnection,
};
use crate::config::AdminEndpoint;

const DEFAULT_ADMIN_DATABASE: &str = "postgres";

/// PostgreSQL adapter. Tenant databases are owned by their login role, so
/// deleting a database also drops that role.
pub struct PostgresEngine {
    endpoint: AdminEndpoint,
    ddl_timeout: Duration,
    probe_timeout: Duration,
}

struct PostgresTenantConnection(PgConnection);

#[async_trait]
impl TenantConnection for PostgresTenantConnection {
    async fn close(self: Box<Self>) {
        if let Err(e) = self.0.close().await {
            debug!("Tenant connection did not close cleanly: {}", e);
        }
    }
}

impl PostgresEngine {
    pub fn new(endpoint: AdminEndpoint, ddl_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            endpoint,
            ddl_timeout,
            probe_timeout,
        }
    }

    fn base_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.endpoint.host)
            .port(self.endpoint.port)
    }

    async fn admin_connection(&self) -> Result<PgConnection, EngineError> {
        let options = self
            .base_options()
            .username(&self.endpoint.admin_user)
            .password(&self.endpoint.admin_password)
            .database(
                self.endpoint
                    .admin_database
                    .as_deref()
                    .unwrap_or(DEFAULT_ADMIN_DATABASE),
            );

        with_timeout(self.ddl_timeout, async {
            PgConnection::connect_with(&options)
                .await
                .map_err(EngineError::Connect)
        })
        .await
    }

    /// Execute one statement over the simple query protocol (CREATE DATABASE
    /// cannot run inside the implicit transaction of an extended query).
    async fn run(&self, conn: &mut PgConnection, label: &str, sql: String) -> Result<(), EngineError> {
        with_timeout(self.ddl_timeout, async {
            (&mut *conn)
                .execute(sql.as_str())
                .await
                .map(|_| ())
                .map_err(|source| EngineError::Statement {
                    statement: label.to_string(),
                    source,
                })
        })
        .await
    }

    async fn run_quietly(&self, conn: &mut PgConnection, label: &str, sql: String) {
        if let Err(e) = self.run(conn, label, sql).await {
            warn!(flavour = "postgres", "Cleanup step failed: {}", e);
        }
    }

    /// Role, then database, then grant. Nothing is unwound here; see `settle_create`.
    async fn create_objects(
        &self,
        conn: &mut PgConnection,
        name: &str,
        user: &str,
        password: &str,
    ) -> Result<(), CreateFailure> {
        let db = quote_identifier(ensure_identifier(name).map_err(CreateFailure::before_create)?);
        let role = quote_identifier(ensure_identifier(user).map_err(CreateFailure::before_create)?);

        let steps = [
            (
                "CREATE ROLE",
                format!("CREATE ROLE {role} WITH LOGIN PASSWORD {}", quote_literal(password)),
            ),
            ("CREATE DATABASE", format!("CREATE DATABASE {db} OWNER {role}")),
            ("GRANT", format!("GRANT ALL PRIVILEGES ON DATABASE {db} TO {role}")),
        ];
        for (completed, (label, sql)) in steps.into_iter().enumerate() {
            self.run(conn, label, sql)
                .await
                .map_err(|e| CreateFailure::at_step(e, completed))?;
        }
        Ok(())
    }

    /// Drop whatever the first `applied` create statements may have made
    async fn remove_leftovers(&self, conn: &mut PgConnection, name: &str, user: &str, applied: usize) {
        if applied >= 2 {
            let db = quote_identifier(name);
            self.run_quietly(conn, "DROP DATABASE", format!("DROP DATABASE IF EXISTS {db}")).await;
        }
        if applied >= 1 {
            let role = quote_identifier(user);
            self.run_quietly(conn, "DROP ROLE", format!("DROP ROLE IF EXISTS {role}")).await;
        }
    }

    /// Close the admin connection and unwind a failed create. After a timeout the
    /// connection may be mid-protocol, so cleanup runs on a fresh one.
    async fn settle_create(
        &self,
        mut conn: PgConnection,
        name: &str,
        user: &str,
        result: Result<(), CreateFailure>,
    ) -> Result<(), EngineError> {
        let failure = match result {
            Ok(()) => {
                Self::release(conn).await;
                return Ok(());
            }
            Err(failure) => failure,
        };

        if failure.error.is_timeout() {
            drop(conn);
            if failure.applied > 0 {
                match self.admin_connection().await {
                    Ok(mut fresh) => {
                        self.remove_leftovers(&mut fresh, name, user, failure.applied).await;
                        Self::release(fresh).await;
                    }
                    Err(e) => warn!(
                        flavour = "postgres",
                        database = name,
                        error = %e,
                        "Could not reconnect to remove objects left by a timed-out create"
                    ),
                }
            }
        } else {
            self.remove_leftovers(&mut conn, name, user, failure.applied).await;
            Self::release(conn).await;
        }
        Err(failure.error)
    }

    async fn database_owner(&self, conn: &mut PgConnection, name: &str) -> Result<Option<String>, EngineError> {
        with_timeout(self.ddl_timeout, async {
            sqlx::query_scalar::<_, String>(
                "SELECT pg_catalog.pg_get_userbyid(datdba)::text FROM pg_catalog.pg_database WHERE datname = $1",
            )
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|source| EngineError::Statement {
                statement: "SELECT pg_database".to_string(),
                source,
            })
        })
        .await
    }

    /// Disconnect tenant sessions so the database can be dropped
    async fn terminate_sessions(&self, conn: &mut PgConnection, name: &str) -> Result<(), EngineError> {
        with_timeout(self.ddl_timeout, async {
            sqlx::query(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1 AND pid <> pg_backend_pid()",
            )
            .bind(name)
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|source| EngineError::Statement {
                statement: "pg_terminate_backend".to_string(),
                source,
            })
        })
        .await
    }

    async fn drop_objects(&self, conn: &mut PgConnection, name: &str) -> Result<(), EngineError> {
        let db = quote_identifier(ensure_identifier(name)?);
        let owner = self
            .database_owner(conn, name)
            .await?
            .ok_or_else(|| EngineError::MissingDatabase(name.to_string()))?;

        self.terminate_sessions(conn, name).await?;
        self.run(conn, "DROP DATABASE", format!("DROP DATABASE {db}")).await?;

        // Never drop the administrative role itself
        if owner != self.endpoint.admin_user && super::is_identifier_safe(&owner) {
            let role = quote_identifier(&owner);
            self.run_quietly(conn, "DROP ROLE", format!("DROP ROLE IF EXISTS {role}")).await;
        }
        Ok(())
    }

    async fn recreate_objects(
        &self,
        conn: &mut PgConnection,
        name: &str,
        user: &str,
        password: &str,
    ) -> Result<(), CreateFailure> {
        let db = quote_identifier(ensure_identifier(name).map_err(CreateFailure::before_create)?);
        let role = quote_identifier(ensure_identifier(user).map_err(CreateFailure::before_create)?);

        self.terminate_sessions(conn, name)
            .await
            .map_err(CreateFailure::before_create)?;
        self.run(conn, "DROP DATABASE", format!("DROP DATABASE IF EXISTS {db}"))
            .await
            .map_err(CreateFailure::before_create)?;
        self.run(conn, "DROP ROLE", format!("DROP ROLE IF EXISTS {role}"))
            .await
            .map_err(CreateFailure::before_create)?;
        self.create_objects(conn, name, user, password).await
    }

    async fn release(conn: PgConnection) {
        if let Err(e) = conn.close().await {
            debug!(flavour = "postgres", "Admin connection did not close cleanly: {}", e);
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// PostgreSQL string literal (standard_conforming_strings)
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn report(operation: &str, name: &str, result: Result<(), EngineError>) -> bool {
    match result {
        Ok(()) => {
            info!(flavour = "postgres", database = name, "{} succeeded", operation);
            true
        }
        Err(e) => {
            warn!(flavour = "postgres", database = name, error = %e, "{} failed", operation);
            false
        }
    }
}

#[async_trait]
impl DatabaseEngine for PostgresEngine {
    fn flavour(&self) -> Flavour {
        Flavour::Postgres
    }

    async fn check_connection(&self) -> bool {
        match self.admin_connection().await {
            Ok(conn) => {
                Self::release(conn).await;
                true
            }
            Err(e) => {
                warn!(flavour = "postgres", host = %self.endpoint.host, error = %e, "Administrative connection failed");
                false
            }
        }
    }

    async fn create_database(&self, name: &str, user: &str, password: &str) -> bool {
        if let Err(e) = ensure_identifier(name).and(ensure_identifier(user)) {
            return report("create database", name, Err(e));
        }
        let mut conn = match self.admin_connection().await {
            Ok(conn) => conn,
            Err(e) => return report("create database", name, Err(e)),
        };
        let result = self.create_objects(&mut conn, name, user, password).await;
        let result = self.settle_create(conn, name, user, result).await;
        report("create database", name, result)
    }

    async fn delete_database(&self, name: &str) -> bool {
        if let Err(e) = ensure_identifier(name) {
            return report("delete database", name, Err(e));
        }
        let mut conn = match self.admin_connection().await {
            Ok(conn) => conn,
            Err(e) => return report("delete database", name, Err(e)),
        };
        let result = self.drop_objects(&mut conn, name).await;
        Self::release(conn).await;
        report("delete database", name, result)
    }

    async fn reset_database(&self, name: &str, user: &str, password: &str) -> bool {
        if let Err(e) = ensure_identifier(name).and(ensure_identifier(user)) {
            return report("reset database", name, Err(e));
        }
        let mut conn = match self.admin_connection().await {
            Ok(conn) => conn,
            Err(e) => return report("reset database", name, Err(e)),
        };
        let result = self.recreate_objects(&mut conn, name, user, password).await;
        let result = self.settle_create(conn, name, user, result).await;
        report("reset database", name, result)
    }

    async fn create_db_connection(
        &self,
        user: &str,
        password: &str,
        db_name: &str,
    ) -> Result<Box<dyn TenantConnection>, EngineError> {
        let options = self
            .base_options()
            .username(user)
            .password(password)
            .database(db_name);

        let conn = with_timeout(self.probe_timeout, async {
            PgConnection::connect_with(&options)
                .await
                .map_err(EngineError::Connect)
        })
        .await?;

        Ok(Box::new(PostgresTenantConnection(conn)))
    }
}
