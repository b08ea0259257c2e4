use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Owning project. Managed elsewhere; only read here to validate references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub organisation_id: Option<Uuid>,
    pub date_created: DateTime<Utc>,
}
