use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    ensure_identifier, with_timeout, CreateFailure, DatabaseEngine, EngineError, Flavour, TenantConnection,
};
use crate::config::AdminEndpoint;

/// MySQL adapter. Every call opens one administrative connection and closes it before returning.
pub struct MysqlEngine {
    endpoint: AdminEndpoint,
    ddl_timeout: Duration,
    probe_timeout: Duration,
}

struct MysqlTenantConnection(MySqlConnection);

#[async_trait]
impl TenantConnection for MysqlTenantConnection {
    async fn close(self: Box<Self>) {
        if let Err(e) = self.0.close().await {
            debug!("Tenant connection did not close cleanly: {}", e);
        }
    }
}

impl MysqlEngine {
    pub fn new(endpoint: AdminEndpoint, ddl_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            endpoint,
            ddl_timeout,
            probe_timeout,
        }
    }

    fn base_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.endpoint.host)
            .port(self.endpoint.port)
    }

    async fn admin_connection(&self) -> Result<MySqlConnection, EngineError> {
        let options = self
            .base_options()
            .username(&self.endpoint.admin_user)
            .password(&self.endpoint.admin_password);

        with_timeout(self.ddl_timeout, async {
            MySqlConnection::connect_with(&options)
                .await
                .map_err(EngineError::Connect)
        })
        .await
    }

    /// Execute one DDL statement over the text protocol. `label` is what gets logged,
    /// never the statement itself, since it may carry a password.
    async fn run(&self, conn: &mut MySqlConnection, label: &str, sql: String) -> Result<(), EngineError> {
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

    /// Best-effort cleanup; failures are logged and otherwise ignored.
    async fn run_quietly(&self, conn: &mut MySqlConnection, label: &str, sql: String) {
        if let Err(e) = self.run(conn, label, sql).await {
            warn!(flavour = "mysql", "Cleanup step failed: {}", e);
        }
    }

    /// Database, then user, then grant. Nothing is unwound here; see `settle_create`.
    async fn create_objects(
        &self,
        conn: &mut MySqlConnection,
        name: &str,
        user: &str,
        password: &str,
    ) -> Result<(), CreateFailure> {
        let db = quote_identifier(ensure_identifier(name).map_err(CreateFailure::before_create)?);
        let account = account(ensure_identifier(user).map_err(CreateFailure::before_create)?);

        let steps = [
            ("CREATE DATABASE", format!("CREATE DATABASE {db}")),
            (
                "CREATE USER",
                format!("CREATE USER {account} IDENTIFIED BY {}", quote_literal(password)),
            ),
            ("GRANT", grant_statement(name, &account)),
            ("FLUSH PRIVILEGES", "FLUSH PRIVILEGES".to_string()),
        ];
        for (completed, (label, sql)) in steps.into_iter().enumerate() {
            self.run(conn, label, sql)
                .await
                .map_err(|e| CreateFailure::at_step(e, completed))?;
        }
        Ok(())
    }

    /// Drop whatever the first `applied` create statements may have made
    async fn remove_leftovers(&self, conn: &mut MySqlConnection, name: &str, user: &str, applied: usize) {
        if applied >= 2 {
            let account = account(user);
            self.run_quietly(conn, "DROP USER", format!("DROP USER IF EXISTS {account}")).await;
        }
        if applied >= 1 {
            let db = quote_identifier(name);
            self.run_quietly(conn, "DROP DATABASE", format!("DROP DATABASE IF EXISTS {db}")).await;
        }
    }

    /// Close the admin connection and unwind a failed create. After a timeout the
    /// connection may be mid-protocol, so cleanup runs on a fresh one.
    async fn settle_create(
        &self,
        mut conn: MySqlConnection,
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
                        flavour = "mysql",
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

    /// Accounts holding schema-level grants on `name`; these are the tenant logins we created for it.
    async fn owning_accounts(&self, conn: &mut MySqlConnection, name: &str) -> Result<Vec<String>, EngineError> {
        // mysql.db keeps the grant pattern as written, wildcards escaped
        let rows: Vec<(String, String)> = with_timeout(self.ddl_timeout, async {
            sqlx::query_as("SELECT CAST(User AS CHAR), CAST(Host AS CHAR) FROM mysql.db WHERE Db = ? OR Db = ?")
                .bind(grant_pattern(name))
                .bind(name)
                .fetch_all(&mut *conn)
                .await
                .map_err(|source| EngineError::Statement {
                    statement: "SELECT mysql.db".to_string(),
                    source,
                })
        })
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(user, _)| super::is_identifier_safe(user))
            .map(|(user, host)| format!("'{}'@{}", user, quote_literal(&host)))
            .collect())
    }

    async fn drop_objects(&self, conn: &mut MySqlConnection, name: &str) -> Result<(), EngineError> {
        let db = quote_identifier(ensure_identifier(name)?);
        let accounts = self.owning_accounts(conn, name).await?;

        // No IF EXISTS: a missing database must surface as a failure
        self.run(conn, "DROP DATABASE", format!("DROP DATABASE {db}")).await?;
        for account in accounts {
            self.run_quietly(conn, "DROP USER", format!("DROP USER IF EXISTS {account}")).await;
        }
        Ok(())
    }

    async fn recreate_objects(
        &self,
        conn: &mut MySqlConnection,
        name: &str,
        user: &str,
        password: &str,
    ) -> Result<(), CreateFailure> {
        let db = quote_identifier(ensure_identifier(name).map_err(CreateFailure::before_create)?);
        let account = account(ensure_identifier(user).map_err(CreateFailure::before_create)?);
        self.run(conn, "DROP DATABASE", format!("DROP DATABASE IF EXISTS {db}"))
            .await
            .map_err(CreateFailure::before_create)?;
        self.run(conn, "DROP USER", format!("DROP USER IF EXISTS {account}"))
            .await
            .map_err(CreateFailure::before_create)?;
        self.create_objects(conn, name, user, password).await
    }

    async fn release(conn: MySqlConnection) {
        if let Err(e) = conn.close().await {
            debug!(flavour = "mysql", "Admin connection did not close cleanly: {}", e);
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn account(user: &str) -> String {
    format!("'{}'@'%'", user)
}

/// Schema name as a GRANT pattern: `_` and `%` are wildcards there unless escaped
fn grant_pattern(name: &str) -> String {
    name.replace('\\', "\\\\").replace('_', "\\_").replace('%', "\\%")
}

fn grant_statement(name: &str, account: &str) -> String {
    format!("GRANT ALL PRIVILEGES ON {}.* TO {account}", quote_identifier(&grant_pattern(name)))
}

/// MySQL string literal with quotes and backslashes escaped
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn report(operation: &str, name: &str, result: Result<(), EngineError>) -> bool {
    match result {
        Ok(()) => {
            info!(flavour = "mysql", database = name, "{} succeeded", operation);
            true
        }
        Err(e) => {
            warn!(flavour = "mysql", database = name, error = %e, "{} failed", operation);
            false
        }
    }
}

#[async_trait]
impl DatabaseEngine for MysqlEngine {
    fn flavour(&self) -> Flavour {
        Flavour::Mysql
    }

    async fn check_connection(&self) -> bool {
        match self.admin_connection().await {
            Ok(conn) => {
                Self::release(conn).await;
                true
            }
            Err(e) => {
                warn!(flavour = "mysql", host = %self.endpoint.host, error = %e, "Administrative connection failed");
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
            MySqlConnection::connect_with(&options)
                .await
                .map_err(EngineError::Connect)
        })
        .await?;

        Ok(Box::new(MysqlTenantConnection(conn)))
    }
}
