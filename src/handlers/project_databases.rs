// handlers/project_databases.rs - /projects/:project_id/databases handlers
//
// Project-scoped provisioning. The project comes from the path; records of
// other projects are invisible here.

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

/// POST /projects/:project_id/databases - provision a database for the project
///
/// Missing `name`, `user` and `password` are generated. The password is only
/// ever returned in this response.
pub async fn database_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<CreatedProjectDatabase> {
    let project_id = parse_uuid("project_id", &project_id)?;
    let body = json_body(body)?;

    tracing::info!(user_id = %user.user_id, %project_id, "Create project database requested");
    let created = state.provisioning.create(Scope::Project(project_id), body).await?;
    Ok(ApiResponse::created(created))
}

/// GET /projects/:project_id/databases
pub async fn database_list(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<ProjectDatabaseView>> {
    let project_id = parse_uuid("project_id", &project_id)?;
    let databases = state.provisioning.list(Scope::Project(project_id)).await?;
    Ok(ApiResponse::success(databases))
}

/// GET /projects/:project_id/databases/:database_id - record plus live `db_status`
pub async fn database_show(
    State(state): State<AppState>,
    Path((project_id, database_id)): Path<(String, String)>,
) -> ApiResult<ProjectDatabaseView> {
    let project_id = parse_uuid("project_id", &project_id)?;
    let database_id = parse_uuid("database_id", &database_id)?;

    let database = state
        .provisioning
        .get_with_status(Scope::Project(project_id), database_id)
        .await?;
    Ok(ApiResponse::success(database))
}

/// DELETE /projects/:project_id/databases/:database_id
pub async fn database_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, database_id)): Path<(String, String)>,
) -> ApiResult<Message> {
    let project_id = parse_uuid("project_id", &project_id)?;
    let database_id = parse_uuid("database_id", &database_id)?;

    tracing::info!(user_id = %user.user_id, %project_id, %database_id, "Delete project database requested");
    state
        .provisioning
        .delete(Scope::Project(project_id), database_id)
        .await?;
    Ok(ApiResponse::message("Database Successfully deleted"))
}

/// POST /projects/:project_id/databases/:database_id/reset
pub async fn database_reset(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, database_id)): Path<(String, String)>,
) -> ApiResult<Message> {
    let project_id = parse_uuid("project_id", &project_id)?;
    let database_id = parse_uuid("database_id", &database_id)?;

    tracing::info!(user_id = %user.user_id, %project_id, %database_id, "Reset project database requested");
    state
        .provisioning
        .reset(Scope::Project(project_id), database_id)
        .await?;
    Ok(ApiResponse::message("Database Reset Successfully"))
}
