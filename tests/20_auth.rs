mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn admin_routes_reject_missing_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/databases", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn project_routes_reject_garbage_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/projects/{}/databases", server.base_url, uuid_like()))
        .bearer_auth("not.a.jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

fn uuid_like() -> &'static str {
    "3f2a8b8e-6a55-4c8e-9a3b-6b2f2f0e9c11"
}

fn token(role: &str) -> String {
    let claims = project_db_api::auth::Claims::new(uuid::Uuid::new_v4(), role, 1);
    project_db_api::auth::generate_jwt(&claims, common::JWT_SECRET).expect("token")
}

#[tokio::test]
async fn admin_routes_reject_non_admin_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/databases", server.base_url))
        .bearer_auth(token(project_db_api::auth::USER_ROLE))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_rejected_before_the_store() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/databases/not-a-uuid", server.base_url))
        .bearer_auth(token(project_db_api::auth::ADMIN_ROLE))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}
