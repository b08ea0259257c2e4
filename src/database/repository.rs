use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Project, ProjectDatabase};

const RECORD_COLUMNS: &str =
    r#"id, name, "user", password, project_id, database_flavour_name, host, port, date_created"#;

/// Persistence operations the provisioning service needs
#[async_trait]
pub trait ProjectDatabaseStore: Send + Sync {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, DatabaseError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<ProjectDatabase>, DatabaseError>;

    async fn find_by_user(&self, user: &str) -> Result<Option<ProjectDatabase>, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<ProjectDatabase>, DatabaseError>;

    /// All records, or only those of one project
    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<ProjectDatabase>, DatabaseError>;

    async fn insert(&self, record: &ProjectDatabase) -> Result<ProjectDatabase, DatabaseError>;

    /// Returns false when no row was deleted
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct ProjectDatabaseRepository {
    pool: PgPool,
}

impl ProjectDatabaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_first(&self, column: &str, value: &str) -> Result<Option<ProjectDatabase>, DatabaseError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM project_databases WHERE {column} = $1 LIMIT 1"
        );
        let record = sqlx::query_as::<_, ProjectDatabase>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }
}

#[async_trait]
impl ProjectDatabaseStore for ProjectDatabaseRepository {
    async fn find_project(&self, project_id: Uuid) -> Result<Option<Project>, DatabaseError> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, name, organisation_id, date_created FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ProjectDatabase>, DatabaseError> {
        self.find_first("name", name).await
    }

    async fn find_by_user(&self, user: &str) -> Result<Option<ProjectDatabase>, DatabaseError> {
        self.find_first(r#""user""#, user).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProjectDatabase>, DatabaseError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM project_databases WHERE id = $1");
        let record = sqlx::query_as::<_, ProjectDatabase>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<ProjectDatabase>, DatabaseError> {
        let records = match project_id {
            Some(project_id) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM project_databases WHERE project_id = $1 ORDER BY date_created DESC"
                );
                sqlx::query_as::<_, ProjectDatabase>(&sql)
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM project_databases ORDER BY date_created DESC"
                );
                sqlx::query_as::<_, ProjectDatabase>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(records)
    }

    async fn insert(&self, record: &ProjectDatabase) -> Result<ProjectDatabase, DatabaseError> {
        let sql = format!(
            r#"INSERT INTO project_databases ({RECORD_COLUMNS})
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {RECORD_COLUMNS}"#
        );
        sqlx::query_as::<_, ProjectDatabase>(&sql)
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.user)
            .bind(&record.password)
            .bind(record.project_id)
            .bind(&record.database_flavour_name)
            .bind(&record.host)
            .bind(record.port)
            .bind(record.date_created)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_write)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM project_databases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
