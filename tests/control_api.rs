//! Control API over a live server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use surge::admin::ControlState;
use surge::dispatch::HttpTransport;
use surge::upstream::EndpointRotator;
use surge::{ControlServer, Controller, Shutdown};

mod common;

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(api_key: Option<&str>) -> Self {
        let config = common::test_config();
        let transport = HttpTransport::from_config(&config.request, &config.timeouts).unwrap();
        let controller = Arc::new(Controller::new(
            transport,
            &config,
            Arc::new(EndpointRotator::disabled()),
        ));
        let state = ControlState::new(controller, api_key.map(String::from));
        let server = ControlServer::new(state, Duration::from_secs(5));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let stop = shutdown.wait();
        tokio::spawn(async move {
            let _ = server.run(listener, stop).await;
        });

        Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let res = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[tokio::test]
async fn test_root_and_idle_status() {
    let server = TestServer::start(None).await;

    let (code, body) = server.get("/").await;
    assert_eq!(code, 200);
    assert_eq!(body["name"], "surge");
    assert_eq!(body["status"], "operational");

    let (code, body) = server.get("/status").await;
    assert_eq!(code, 200);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["running"], false);
    assert_eq!(body["succeeded"], 0);
}

#[tokio::test]
async fn test_start_validation_errors() {
    let server = TestServer::start(None).await;

    let (code, body) = server
        .post("/start", json!({ "target": 0, "destination": "ftp://nowhere" }))
        .await;
    assert_eq!(code, 400);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (code, body) = server
        .post(
            "/start",
            json!({
                "target": 5,
                "destination": "http://127.0.0.1:1/",
                "overrides": { "max_concurrency": 0 }
            }),
        )
        .await;
    assert_eq!(code, 422);
    assert_eq!(body["errors"][0]["field"], "max_concurrency");

    let (_, status) = server.get("/status").await;
    assert_eq!(status["phase"], "idle");
}

#[tokio::test]
async fn test_run_commands() {
    let backend = common::start_slow_backend(Duration::from_millis(20)).await;
    let server = TestServer::start(None).await;

    let (code, body) = server.post("/pause", json!({})).await;
    assert_eq!(code, 409);
    assert_eq!(body["accepted"], false);

    let destination = format!("http://{}/", backend);
    let (code, body) = server
        .post("/start", json!({ "target": 1_000_000, "destination": destination }))
        .await;
    assert_eq!(code, 202);
    assert_eq!(body["accepted"], true);
    assert!(body["run"]["run_id"].is_string());

    let (code, _) = server
        .post("/start", json!({ "target": 5, "destination": destination }))
        .await;
    assert_eq!(code, 409);

    assert_eq!(server.post("/pause", json!({})).await.0, 200);
    assert_eq!(server.post("/pause", json!({})).await.0, 200);
    assert_eq!(server.get("/status").await.1["phase"], "paused");

    assert_eq!(server.post("/resume", json!({})).await.0, 200);
    assert_eq!(server.get("/status").await.1["phase"], "running");

    let (code, body) = server.post("/stop", json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(body["accepted"], true);

    let (_, status) = server.get("/status").await;
    assert_eq!(status["phase"], "stopped");
    assert_eq!(status["running"], false);
    assert_eq!(server.post("/stop", json!({})).await.0, 409);
}

#[tokio::test]
async fn test_config_round_trip() {
    let server = TestServer::start(None).await;

    let (code, before) = server.get("/config").await;
    assert_eq!(code, 200);
    assert_eq!(before["max_concurrency"], 20);

    let (code, after) = server
        .put("/config", json!({ "batch_size": 7, "pool_size": 64 }))
        .await;
    assert_eq!(code, 200);
    assert_eq!(after["batch_size"], 7);
    assert_eq!(after["pool_size"], 64);
    assert_eq!(after["max_concurrency"], 20);

    let (code, body) = server
        .put("/config", json!({ "min_delay_ms": 9, "max_delay_ms": 3 }))
        .await;
    assert_eq!(code, 422);
    assert_eq!(body["accepted"], false);
    assert_eq!(server.get("/config").await.1, after);

    // Fields outside the whitelist are refused outright.
    let (code, _) = server.put("/config", json!({ "request_ms": 1 })).await;
    assert_eq!(code, 422);
}

#[tokio::test]
async fn test_bearer_auth() {
    let server = TestServer::start(Some("s3cret")).await;

    assert_eq!(server.get("/").await.0, 200);
    assert_eq!(server.get("/status").await.0, 401);

    let res = server
        .client
        .get(server.url("/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = server
        .client
        .get(server.url("/status"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let server = TestServer::start(None).await;

    let res = server.client.get(server.url("/status")).send().await.unwrap();
    let generated = res.headers().get("x-request-id").cloned();
    assert!(generated.is_some());

    let res = server
        .client
        .get(server.url("/status"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me-123");
}
