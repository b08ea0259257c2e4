// handlers/public.rs - GET / and GET /health (no authentication)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use super::AppState;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let flavours: Vec<&str> = state
        .provisioning
        .registry()
        .bindings()
        .iter()
        .map(|b| b.flavour.as_str())
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "Project Database API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Provisions isolated MySQL and PostgreSQL databases for projects",
            "flavours": flavours,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "project": "/projects/:project_id/databases[/:database_id[/reset]] (protected)",
                "admin": "/databases[/:database_id[/reset]] (admin role)",
            }
        }
    }))
}

/// Pings the record store. Live database servers are not probed here.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Record store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
