mod common;

use common::{MockRepo, session_cookie_for, test_config, test_state, test_user};
use reqwest::{StatusCode, redirect};
use session_gate::create_router;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

const TEST_USER_ID: Uuid = Uuid::from_u128(7);

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MockRepo::with_user(test_user(TEST_USER_ID)));
    let router = create_router(test_state(test_config(), repo));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are the behavior under test; never follow them.
    let client = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap();

    TestApp { address, client }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/api/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let app = spawn_app().await;

    // Anonymous: bounced to the login page.
    let response = app
        .client
        .get(format!("{}/dashboard", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()["location"], "/login");

    // Signed in: the dashboard renders and the login page bounces back.
    let cookie = session_cookie_for(&test_user(TEST_USER_ID));
    let response = app
        .client
        .get(format!("{}/dashboard", app.address))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(format!("{}/login", app.address))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["location"], "/dashboard");

    // Logout clears the cookie.
    let response = app
        .client
        .post(format!("{}/logout", app.address))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cleared = response.headers()["set-cookie"].to_str().unwrap();
    assert!(cleared.starts_with("session="));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_openapi_document_lists_session_endpoint() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = response.json().await.unwrap();
    assert!(doc["paths"].get("/api/session").is_some());
    assert!(doc["paths"].get("/api/health").is_some());
}
