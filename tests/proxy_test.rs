//! Integration tests for the backend relay route.
//!
//! Spins up a mock backend on a random port, points the gateway's forwarder
//! at it, and drives the gateway router directly with `tower::ServiceExt`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

use taskgate::{config::GatewayConfig, proxy::BACKEND_UNREACHABLE_BODY, rest, AppContext};

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
struct Captured {
    method: String,
    path_and_query: String,
    cookie: Option<String>,
    content_type: Option<String>,
    authorization: Option<String>,
    body: String,
}

type CaptureLog = Arc<Mutex<Vec<Captured>>>;

async fn record(
    State(log): State<CaptureLog>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    log.lock().await.push(Captured {
        method: method.to_string(),
        path_and_query: uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_default(),
        cookie: get(header::COOKIE),
        content_type: get(header::CONTENT_TYPE),
        authorization: get(header::AUTHORIZATION),
        body,
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"ok":true}"#,
    )
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"detail":"Not found"}"#,
    )
}

async fn plain_text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "hello")
}

/// A response with no Content-Type header at all.
async fn no_content_type() -> axum::response::Response {
    axum::http::Response::builder()
        .status(StatusCode::OK)
        .body(Body::from("bare"))
        .unwrap()
}

/// Start the mock backend; returns its base URL and the capture log.
async fn spawn_backend() -> (String, CaptureLog) {
    let log: CaptureLog = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/missing", axum::routing::any(not_found))
        .route("/plain", axum::routing::any(plain_text))
        .route("/noct", axum::routing::any(no_content_type))
        .fallback(record)
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

/// Build a gateway router whose forwarder targets `backend_url`.
fn gateway(dir: &TempDir, backend_url: &str) -> Router {
    let config = GatewayConfig::new(
        None,
        Some(dir.path().to_path_buf()),
        Some("error".to_string()),
        None,
        Some(backend_url.to_string()),
    );
    rest::build_router(AppContext::new(config).unwrap())
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn get_forwards_cookie_query_and_no_body() {
    let (backend_url, log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/tasks?completed=false")
        .header("cookie", "session=abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = log.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path_and_query, "/tasks?completed=false");
    assert_eq!(seen[0].cookie.as_deref(), Some("session=abc123"));
    assert_eq!(seen[0].body, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn post_forwards_body_and_content_type() {
    let (backend_url, log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("POST")
        .uri("/api/proxy/tasks")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"title":"Buy milk"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = log.lock().await;
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(seen[0].body, r#"{"title":"Buy milk"}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_post_body_is_sent_as_no_body() {
    let (backend_url, log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("POST")
        .uri("/api/proxy/tasks/42/complete")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = log.lock().await;
    assert_eq!(seen[0].path_and_query, "/tasks/42/complete");
    assert_eq!(seen[0].body, "");
}

#[tokio::test(flavor = "multi_thread")]
async fn unlisted_headers_are_dropped() {
    let (backend_url, log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/tasks")
        .header("cookie", "session=abc123")
        .header("authorization", "Bearer should-not-cross")
        .header("x-forwarded-for", "10.0.0.1")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let seen = log.lock().await;
    assert_eq!(seen[0].cookie.as_deref(), Some("session=abc123"));
    assert_eq!(seen[0].authorization, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_error_passes_through_unmodified() {
    let (backend_url, _log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/missing")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_string(response).await, r#"{"detail":"Not found"}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_content_type_is_echoed() {
    let (backend_url, _log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/plain")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(body_string(response).await, "hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_backend_content_type_defaults_to_json() {
    let (backend_url, _log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/noct")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_string(response).await, "bare");
}

#[tokio::test(flavor = "multi_thread")]
async fn percent_encoded_segments_pass_through_undecoded() {
    let (backend_url, log) = spawn_backend().await;
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &backend_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/tasks/a%20b")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let seen = log.lock().await;
    assert_eq!(seen[0].path_and_query, "/tasks/a%20b");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_yields_fixed_503() {
    // Bind a port, then drop the listener so connections are refused.
    let dead_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, &format!("http://127.0.0.1:{dead_port}"));

    let request = Request::builder()
        .method("GET")
        .uri("/api/proxy/tasks")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_string(response).await, BACKEND_UNREACHABLE_BODY);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let app = gateway(&dir, "http://127.0.0.1:1");

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
}
