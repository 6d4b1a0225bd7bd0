//! API integration tests

use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{
    api::{create_router, MAX_BODY_BYTES},
    config::AppConfig,
    models::book::{seed_data, Book, BookDraft},
    repository::{BookRepository, MemoryBookRepository, Repository},
    server,
    services::Services,
    AppResult, AppState,
};

const BASE_URL: &str = "http://localhost:8081";

struct TestApp {
    router: Router,
    repository: Repository,
    state: AppState,
}

fn test_app_with(config: AppConfig) -> TestApp {
    let repository = Repository::in_memory(seed_data());
    let state = AppState::new(config, Services::new(repository.clone()));
    TestApp {
        router: create_router(state.clone()),
        repository,
        state,
    }
}

fn test_app() -> TestApp {
    test_app_with(AppConfig::default())
}

fn expired_app() -> TestApp {
    let mut config = AppConfig::default();
    config.server.request_timeout_secs = 0;
    test_app_with(config)
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ids(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let response = send(&app.router, empty_request(Method::GET, "/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_list_seeded_books() {
    let app = test_app();
    let response = send(&app.router, empty_request(Method::GET, "/api/books")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(ids(&body), vec!["1", "2", "3", "4"]);
    assert_eq!(body[0]["publishedYear"], 2015);
}

#[tokio::test]
async fn test_create_delete_create_keeps_ids_monotonic() {
    let app = test_app();

    let response = send(
        &app.router,
        json_request(
            Method::POST,
            "/api/books",
            json!({ "title": "Rust in Action", "author": "Tim McNamara", "publishedYear": 2021 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::LOCATION], "/api/books/5");
    assert_eq!(body_json(response).await["id"], "5");

    let response = send(&app.router, empty_request(Method::DELETE, "/api/books/2")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app.router,
        json_request(Method::POST, "/api/books", json!({ "title": "Zero To Production", "author": "Luca Palmieri" })),
    )
    .await;
    assert_eq!(body_json(response).await["id"], "6");

    let response = send(&app.router, empty_request(Method::GET, "/api/books")).await;
    assert_eq!(ids(&body_json(response).await), vec!["1", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn test_create_rejects_blank_title() {
    let app = test_app();
    let response = send(
        &app.router,
        json_request(Method::POST, "/api/books", json!({ "title": "  ", "author": "X" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "title and author are required" })
    );
    assert_eq!(app.repository.books.list().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_create_requires_json_content_type() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"title":"T","author":"A"}"#))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        body_json(response).await,
        json!({ "error": "content type must be application/json" })
    );
}

#[tokio::test]
async fn test_malformed_json() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/books/1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{"))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid JSON payload");
}

#[tokio::test]
async fn test_update_preserves_path_id() {
    let app = test_app();
    let response = send(
        &app.router,
        json_request(
            Method::PUT,
            "/api/books/3",
            json!({ "id": "77", "title": "Concurrency in Go, 2nd ed.", "author": "Katherine Cox-Buday" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "3");
    assert_eq!(body["isbn"], "");
}

#[tokio::test]
async fn test_update_missing_book() {
    let app = test_app();
    let before = app.repository.books.list().await.unwrap();

    let response = send(
        &app.router,
        json_request(Method::PUT, "/api/books/99", json!({ "title": "T", "author": "A" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "book not found" }));
    assert_eq!(app.repository.books.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_twice() {
    let app = test_app();

    let first = send(&app.router, empty_request(Method::DELETE, "/api/books/1")).await;
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = send(&app.router, empty_request(Method::DELETE, "/api/books/1")).await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_book_paths() {
    let app = test_app();

    for uri in ["/api/books/5/more", "/api/books/", "/api/books/a%2Fb", "/api/books/42"] {
        let response = send(&app.router, empty_request(Method::GET, uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["error"], "book not found", "{uri}");
    }

    let response = send(&app.router, empty_request(Method::GET, "/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trailing_slash_on_book_id() {
    let app = test_app();

    let response = send(&app.router, empty_request(Method::GET, "/api/books/1/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "1");

    let response = send(
        &app.router,
        json_request(Method::PUT, "/api/books/2/", json!({ "title": "T", "author": "A" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "2");

    let response = send(&app.router, empty_request(Method::DELETE, "/api/books/3/")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_bad_id_reported_before_content_type() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/books/a%2Fb")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("not json"))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "book not found" }));
}

#[tokio::test]
async fn test_oversized_body_is_invalid_json() {
    let app = test_app();
    let oversized = format!(
        r#"{{"title":"{}","author":"X"}}"#,
        "a".repeat(MAX_BODY_BYTES)
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(oversized))
        .unwrap();

    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "invalid JSON payload" }));
    assert_eq!(app.repository.books.list().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_method_not_allowed() {
    let app = test_app();
    let response = send(&app.router, empty_request(Method::PATCH, "/api/books")).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await, json!({ "error": "method not allowed" }));
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    // Every handler would time out, so a 204 proves nothing below CORS ran
    let app = expired_app();

    for uri in ["/api/books", "/api/books/1", "/nowhere"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap();

        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "{uri}");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("PUT") && methods.contains("DELETE"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_cors_headers_on_regular_responses() {
    let app = test_app();

    let requests = [
        empty_request(Method::GET, "/api/books/1"),
        json_request(Method::POST, "/api/books", json!({ "title": "T", "author": "A" })),
        empty_request(Method::DELETE, "/api/books/99"),
    ];

    for request in requests {
        let response = send(&app.router, request).await;
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "location");
    }
}

/// Log sink shared between the subscriber and the test
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_access_log_records_final_status() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = expired_app();
    let response = send(
        &app.router,
        json_request(Method::POST, "/api/books", json!({ "title": "Late", "author": "Writer" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body_len = to_bytes(response.into_body(), usize::MAX).await.unwrap().len();

    let output = logs.contents();
    let access = output
        .lines()
        .find(|line| line.contains("request completed"))
        .expect("no access log line");
    assert!(access.contains("method=POST"), "{access}");
    assert!(access.contains("path=/api/books"), "{access}");
    assert!(access.contains("status=504"), "{access}");
    assert!(access.contains(&format!("bytes={body_len}")), "{access}");
    assert!(access.contains("elapsed="), "{access}");

    // Mutations are logged even though the client only sees the timeout
    assert!(output.contains("Book created"), "{output}");

    let response = send(
        &app.router,
        json_request(Method::PUT, "/api/books/1", json!({ "title": "T", "author": "A" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let response = send(&app.router, empty_request(Method::DELETE, "/api/books/2")).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let output = logs.contents();
    assert!(output.contains("Book updated"), "{output}");
    assert!(output.contains("Book deleted"), "{output}");
}

#[tokio::test]
async fn test_expired_request_still_persists_create() {
    let app = expired_app();

    let response = send(
        &app.router,
        json_request(Method::POST, "/api/books", json!({ "title": "Late", "author": "Writer" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_json(response).await, json!({ "error": "request timed out" }));

    let stored = app.repository.books.get("5").await.unwrap().unwrap();
    assert_eq!(stored.title, "Late");
}

#[tokio::test]
async fn test_shutdown_cancels_requests() {
    let app = test_app();
    app.state.shutdown.cancel();

    let response = send(&app.router, empty_request(Method::DELETE, "/api/books/4")).await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body_json(response).await, json!({ "error": "request canceled" }));
    assert!(app.repository.books.get("4").await.unwrap().is_none());
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app();
    let response = send(&app.router, empty_request(Method::GET, "/api-docs/openapi.json")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["paths"]["/api/books"].is_object());
}

/// Store whose writes take a while, to keep requests in flight
struct SlowRepository {
    inner: MemoryBookRepository,
    delay: Duration,
}

#[async_trait]
impl BookRepository for SlowRepository {
    async fn list(&self) -> AppResult<Vec<Book>> {
        self.inner.list().await
    }

    async fn get(&self, id: &str) -> AppResult<Option<Book>> {
        self.inner.get(id).await
    }

    async fn create(&self, draft: BookDraft) -> AppResult<Book> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(draft).await
    }

    async fn update(&self, id: &str, draft: BookDraft) -> AppResult<Option<Book>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(id, draft).await
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn test_requests_outliving_shutdown_grace_are_canceled() {
    let repository = Repository::new(Arc::new(SlowRepository {
        inner: MemoryBookRepository::new(seed_data()),
        delay: Duration::from_millis(400),
    }));
    let state = AppState::new(AppConfig::default(), Services::new(repository.clone()));
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(
        listener,
        router,
        state.shutdown.clone(),
        Duration::from_millis(50),
        async move {
            stop_rx.await.ok();
        },
    ));

    let request = tokio::spawn(
        Client::new()
            .post(format!("http://{}/api/books", addr))
            .json(&json!({ "title": "Slow", "author": "Writer" }))
            .send(),
    );

    // Let the request reach the store before signalling shutdown
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let response = request.await.unwrap().expect("Failed to send request");
    assert_eq!(response.status().as_u16(), 408);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "error": "request canceled" }));

    server.await.unwrap().unwrap();
    assert!(state.shutdown.is_cancelled());
    assert_eq!(repository.books.get("5").await.unwrap().unwrap().title, "Slow");
}

#[tokio::test]
#[ignore] // Run against a live server with: cargo test -- --ignored
async fn test_live_server_round_trip() {
    let client = Client::new();

    let response = client
        .post(format!("{}/api/books", BASE_URL))
        .json(&json!({ "title": "Live Book", "author": "Tester" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let id = body["id"].as_str().expect("No book ID").to_string();

    let response = client
        .delete(format!("{}/api/books/{}", BASE_URL, id))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 204);
}
