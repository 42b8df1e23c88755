//! Route-level tests of the HTTP surface, driven through the router
//! without binding a socket.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;

use morphboard::app::{AppState, router};
use morphboard::config::Config;
use morphboard::login::AccountStore;
use morphboard::store::DatasetStore;

const SALES_CSV: &[u8] =
    b"Date,Sales,Profit,Cost\n2024-01-01,100,20,80\n2024-01-02,200,50,150\n2024-01-03,300,90,210\n";

fn test_app(dir: &TempDir) -> Router {
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        database_dir: dir.path().display().to_string(),
        google_client_id: None,
    };
    let state = Arc::new(AppState {
        datasets: DatasetStore::new(),
        accounts: AccountStore::open(dir.path()).unwrap(),
        config,
    });
    router(state)
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let boundary = "test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn summary_before_any_upload_is_404() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(&app, Request::get("/api/summary").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("No data available"));
}

#[tokio::test]
async fn upload_summary_chart_round_trip() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    // Upload
    let response = send(&app, upload_request("sales.csv", SALES_CSV)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["filename"], "sales.csv");
    assert_eq!(body["size"], SALES_CSV.len());

    // Summary
    let response = send(&app, Request::get("/api/summary").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_sales"], 600.0);
    assert_eq!(body["rows"], 3);
    assert!(
        body["numeric_columns"]
            .as_array()
            .unwrap()
            .contains(&json!("Gross_Margin_%"))
    );

    // Chart: numeric metric with date labels
    let response = send(
        &app,
        json_request("/api/chart", json!({"metric": "Sales", "type": "line"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["labels"][0], "2024-01-01");
    assert_eq!(
        body["values"],
        json!([100.0, 200.0, 300.0])
    );
}

#[tokio::test]
async fn chart_before_any_upload_is_400() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(
        &app,
        json_request("/api/chart", json!({"metric": "Sales", "type": "line"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("No data available"));
}

#[tokio::test]
async fn chart_rejects_unknown_metric_and_bad_type() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    send(&app, upload_request("sales.csv", SALES_CSV)).await;

    let response = send(
        &app,
        json_request("/api/chart", json!({"metric": "Bogus", "type": "line"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("'Bogus'"));

    let response = send(
        &app,
        json_request("/api/chart", json!({"metric": "Sales", "type": "pie"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Invalid chart type"));
}

#[tokio::test]
async fn bad_upload_reports_400_and_keeps_previous_dataset() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    send(&app, upload_request("sales.csv", SALES_CSV)).await;

    let response = send(&app, upload_request("notes.txt", b"hello")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported file extension")
    );

    // The earlier dataset still serves.
    let response = send(&app, Request::get("/api/summary").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn signup_login_me_and_credits_flow() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(
        &app,
        form_request("/signup", "email=ada%40example.com&name=Ada&password=hunter2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Duplicate signup is rejected.
    let response = send(
        &app,
        form_request("/signup", "email=ada%40example.com&name=Ada&password=hunter2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        form_request("/login", "email=ada%40example.com&password=hunter2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        Request::get("/api/me")
            .header(header::COOKIE, cookie.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["graph_credits"], 10);

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/use-credit")
            .header(header::COOKIE, cookie.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["credits_remaining"], 9);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    send(
        &app,
        form_request("/signup", "email=bob%40example.com&name=Bob&password=secret"),
    )
    .await;

    let response = send(
        &app,
        form_request("/login", "email=bob%40example.com&password=wrong"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_without_a_session_is_401() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(&app, Request::get("/api/me").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn use_credit_without_a_session_is_401() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/use-credit")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_auth_without_configured_client_id_is_500() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let response = send(
        &app,
        json_request("/auth/google", json!({"token": "whatever"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .contains("Google Client ID is not configured")
    );
}
