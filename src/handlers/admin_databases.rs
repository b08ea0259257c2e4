// handlers/admin_databases.rs - /databases handlers (admin role)
//
// Same operations as the project-scoped handlers, across every project.
// A create body may name a `project_id` or omit it.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::Value;

use super::utils::{json_body, parse_uuid};
use super::AppState;
use crate::database::models::{CreatedProjectDatabase, ProjectDatabaseView};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Message};
use crate::services::Scope;

/// POST /databases
pub async fn database_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<CreatedProjectDatabase> {
    let body = json_body(body)?;

    tracing::info!(user_id = %user.user_id, "Admin create database requested");
    let created = state.provisioning.create(Scope::Admin, body).await?;
    Ok(ApiResponse::created(created))
}

/// GET /databases
pub async fn database_list(State(state): State<AppState>) -> ApiResult<Vec<ProjectDatabaseView>> {
    let databases = state.provisioning.list(Scope::Admin).await?;
    Ok(ApiResponse::success(databases))
}

/// GET /databases/:database_id
pub async fn database_show(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
) -> ApiResult<ProjectDatabaseView> {
    let database_id = parse_uuid("database_id", &database_id)?;
    let database = state.provisioning.get_with_status(Scope::Admin, database_id).await?;
    Ok(ApiResponse::success(database))
}

/// DELETE /databases/:database_id
pub async fn database_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(database_id): Path<String>,
) -> ApiResult<Message> {
    let database_id = parse_uuid("database_id", &database_id)?;

    tracing::info!(user_id = %user.user_id, %database_id, "Admin delete database requested");
    state.provisioning.delete(Scope::Admin, database_id).await?;
    Ok(ApiResponse::message("Database Successfully deleted"))
}

/// POST /databases/:database_id/reset
pub async fn database_reset(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(database_id): Path<String>,
) -> ApiResult<Message> {
    let database_id = parse_uuid("database_id", &database_id)?;

    tracing::info!(user_id = %user.user_id, %database_id, "Admin reset database requested");
    state.provisioning.reset(Scope::Admin, database_id).await?;
    Ok(ApiResponse::message("Database Reset Successfully"))
}
