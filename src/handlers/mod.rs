// handlers/mod.rs - Route table
//
// Public (no auth) → Project (JWT) → Admin (JWT + admin role)

pub mod admin_databases;
pub mod project_databases;
pub mod public;
mod utils;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::ProjectDatabaseStore;
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::services::ProvisioningService;

/// Shared handler state, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub provisioning: Arc<ProvisioningService>,
    pub store: Arc<dyn ProjectDatabaseStore>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn ProjectDatabaseStore>, provisioning: ProvisioningService, jwt_secret: &str) -> Self {
        Self {
            provisioning: Arc::new(provisioning),
            store,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(project_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn project_routes(state: AppState) -> Router<AppState> {
    use project_databases as db;

    Router::new()
        .route(
            "/projects/:project_id/databases",
            post(db::database_create).get(db::database_list),
        )
        .route(
            "/projects/:project_id/databases/:database_id",
            get(db::database_show).delete(db::database_delete),
        )
        .route(
            "/projects/:project_id/databases/:database_id/reset",
            post(db::database_reset),
        )
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    use admin_databases as db;

    // Layers run outermost-last: authenticate, then check the role
    Router::new()
        .route("/databases", post(db::database_create).get(db::database_list))
        .route(
            "/databases/:database_id",
            get(db::database_show).delete(db::database_delete),
        )
        .route("/databases/:database_id/reset", post(db::database_reset))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt, Claims, ADMIN_ROLE, USER_ROLE};
    use crate::testing::{record, registry_with, MemoryStore, MockEngine};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret";

    struct Harness {
        store: Arc<MemoryStore>,
        mysql: Arc<MockEngine>,
        app: Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let mysql = Arc::new(MockEngine::mysql());
        let postgres = Arc::new(MockEngine::postgres());
        let provisioning = ProvisioningService::new(store.clone(), registry_with(mysql.clone(), postgres));
        let app = router(AppState::new(store.clone(), provisioning, SECRET));
        Harness { store, mysql, app }
    }

    fn token(role: &str) -> String {
        generate_jwt(&Claims::new(Uuid::new_v4(), role, 1), SECRET).unwrap()
    }

    async fn send(app: &Router, method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(role) = role {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(role)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_and_root_are_public() {
        let h = harness();
        let (status, body) = send(&h.app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");

        let (status, body) = send(&h.app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["flavours"], json!(["mysql", "postgres"]));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let h = harness();
        let project_id = h.store.add_project("shop");

        let (status, body) = send(&h.app, Method::GET, &format!("/projects/{project_id}/databases"), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = send(&h.app, Method::GET, "/databases", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let h = harness();
        let (status, body) = send(&h.app, Method::GET, "/databases", Some(USER_ROLE), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, body) = send(&h.app, Method::GET, "/databases", Some(ADMIN_ROLE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn create_returns_201_with_one_time_password() {
        let h = harness();
        let project_id = h.store.add_project("shop");

        let (status, body) = send(
            &h.app,
            Method::POST,
            &format!("/projects/{project_id}/databases"),
            Some(USER_ROLE),
            Some(json!({ "database_flavour_name": "mysql" })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["data"]["password"].is_string());
        assert!(body["data"].get("db_status").is_none());
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &h.app,
            Method::GET,
            &format!("/projects/{project_id}/databases"),
            Some(USER_ROLE),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], id.as_str());
        assert!(body["data"][0].get("password").is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_400_with_message() {
        let h = harness();
        h.store.add_record(record("shop_db", "shop_user", "mysql", None));

        let (status, body) = send(
            &h.app,
            Method::POST,
            "/databases",
            Some(ADMIN_ROLE),
            Some(json!({ "database_flavour_name": "mysql", "name": "shop_db" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "DUPLICATE_NAME");
        assert_eq!(body["message"], "Database shop_db Already Exists.");
    }

    #[tokio::test]
    async fn unknown_flavour_is_409() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            Method::POST,
            "/databases",
            Some(ADMIN_ROLE),
            Some(json!({ "database_flavour_name": "oracle" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Database flavour with name oracle is not mysql or postgres.");
        assert!(h.mysql.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_input_is_a_validation_error() {
        let h = harness();

        let (status, body) = send(&h.app, Method::GET, "/databases/not-a-uuid", Some(ADMIN_ROLE), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["database_id"].is_string());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/databases")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(ADMIN_ROLE)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_delete_and_reset_by_id() {
        let h = harness();
        let project_id = h.store.add_project("shop");
        let stored = h.store.add_record(record("shop_db", "shop_user", "mysql", Some(project_id)));
        h.mysql.mark_live("shop_db");
        let base = format!("/projects/{project_id}/databases/{}", stored.id);

        let (status, body) = send(&h.app, Method::GET, &base, Some(USER_ROLE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["db_status"], true);
        assert!(body["data"].get("password").is_none());

        let (status, body) = send(&h.app, Method::POST, &format!("{base}/reset"), Some(USER_ROLE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Database Reset Successfully");

        let (status, body) = send(&h.app, Method::DELETE, &base, Some(USER_ROLE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Database Successfully deleted");

        let (status, body) = send(&h.app, Method::GET, &base, Some(USER_ROLE), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn partial_failure_is_reported_distinctly() {
        let h = harness();
        h.store.set_fail_writes(true);

        let (status, body) = send(
            &h.app,
            Method::POST,
            "/databases",
            Some(ADMIN_ROLE),
            Some(json!({ "database_flavour_name": "mysql", "name": "orphan_db" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "PARTIAL_FAILURE");
        assert_eq!(body["retryable"], false);
        assert!(body["record_id"].is_string());
    }
}
