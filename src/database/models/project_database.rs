use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable row for a provisioned tenant database
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProjectDatabase {
    pub id: Uuid,
    pub name: String,
    pub user: String,
    pub password: String,
    pub project_id: Option<Uuid>,
    pub database_flavour_name: String,
    pub host: String,
    pub port: i32,
    pub date_created: DateTime<Utc>,
}

/// Serialized form of a record. The password is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDatabaseView {
    pub id: Uuid,
    pub name: String,
    pub user: String,
    pub project_id: Option<Uuid>,
    pub database_flavour_name: String,
    pub host: String,
    pub port: i32,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_status: Option<bool>,
}

/// Create response: the only place the password is ever returned
#[derive(Debug, Clone, Serialize)]
pub struct CreatedProjectDatabase {
    #[serde(flatten)]
    pub database: ProjectDatabaseView,
    pub password: String,
}

impl From<&ProjectDatabase> for ProjectDatabaseView {
    fn from(record: &ProjectDatabase) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            user: record.user.clone(),
            project_id: record.project_id,
            database_flavour_name: record.database_flavour_name.clone(),
            host: record.host.clone(),
            port: record.port,
            date_created: record.date_created,
            db_status: None,
        }
    }
}

impl ProjectDatabaseView {
    pub fn with_status(mut self, db_status: bool) -> Self {
        self.db_status = Some(db_status);
        self
    }
}

impl From<ProjectDatabase> for CreatedProjectDatabase {
    fn from(record: ProjectDatabase) -> Self {
        Self {
            database: ProjectDatabaseView::from(&record),
            password: record.password,
        }
    }
}
