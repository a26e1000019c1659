//! Shared harness for the HTTP integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use qinjian::{
    ai::{ChatBackend, ChatRequest},
    config::ServerConfig,
    context::AppContext,
    error::AppResult,
    server::build_router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Reply used for every chat call; it satisfies each report parser
pub const CANNED_REPLY: &str = r#"{
    "sentiment": "positive",
    "score": 8,
    "emotions": ["joy"],
    "health_score": 82,
    "insight": "steady and warm",
    "suggestion": "plan a walk together",
    "overall_health_score": 80,
    "trend": "stable"
}"#;

/// Chat backend that answers with a fixed reply and counts calls
pub struct CannedBackend {
    reply: String,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl CannedBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for CannedBackend {
    async fn complete(&self, request: ChatRequest) -> AppResult<String> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }
}

pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub ctx: AppContext,
    pub router: Router,
    pub backend: Arc<CannedBackend>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_directory(dir.path());
        adjust(&mut config);

        let backend = CannedBackend::new(CANNED_REPLY);
        let ctx = AppContext::with_chat_backend(config, backend.clone())
            .await
            .unwrap();
        let router = build_router(ctx.clone());

        Self {
            dir,
            ctx,
            router,
            backend,
        }
    }

    /// Send a request and decode the JSON response (Null for empty bodies)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Register a user and return the access token
    pub async fn register(&self, email: &str, nickname: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "nickname": nickname,
                    "password": "secret123"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Two registered users joined into an active couple pair
    pub async fn active_pair(&self) -> (String, String, String) {
        let alice = self.register("alice@example.com", "Alice").await;
        let bob = self.register("bob@example.com", "Bob").await;

        let (status, pair) = self
            .post("/api/v1/pairs/create", &alice, serde_json::json!({"type": "couple"}))
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {}", pair);

        let code = pair["invite_code"].as_str().unwrap();
        let (status, joined) = self
            .post("/api/v1/pairs/join", &bob, serde_json::json!({"invite_code": code}))
            .await;
        assert_eq!(status, StatusCode::OK, "join failed: {}", joined);
        assert_eq!(joined["status"], "active");

        (alice, bob, pair["id"].as_str().unwrap().to_string())
    }

    /// Poll the latest report of a type until it leaves pending
    pub async fn wait_for_report(&self, token: &str, pair_id: &str, report_type: &str) -> Value {
        let uri = format!(
            "/api/v1/reports/latest?pair_id={}&report_type={}",
            pair_id, report_type
        );
        for _ in 0..100 {
            let (_, report) = self.get(&uri, token).await;
            if report["status"] != "pending" && !report.is_null() {
                return report;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("report {} for pair {} never finished", report_type, pair_id);
    }
}

/// Multipart body with a single `file` field
pub fn multipart_request(uri: &str, token: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "qinjian-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.bin\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}
