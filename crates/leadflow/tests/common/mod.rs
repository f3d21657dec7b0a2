#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use leadflow::{build_router, ApiKeys, AppState, EnrichmentService, JobStore, WebhookRunner};
use serde_json::Value;
use tokio::net::TcpListener;

/// Webhook stand-in that records trigger bodies and answers with a fixed status.
#[derive(Clone)]
pub struct StubRunner {
    pub addr: SocketAddr,
    status: Arc<AtomicU16>,
    triggers: Arc<Mutex<Vec<Value>>>,
}

impl StubRunner {
    pub fn webhook_url(&self) -> String {
        format!("http://{}/webhook/enrich", self.addr)
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn triggers(&self) -> Vec<Value> {
        self.triggers.lock().expect("triggers lock").clone()
    }
}

#[derive(Clone)]
struct StubState {
    status: Arc<AtomicU16>,
    triggers: Arc<Mutex<Vec<Value>>>,
}

async fn record_trigger(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    state.triggers.lock().expect("triggers lock").push(body);
    StatusCode::from_u16(state.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn spawn_stub_runner(status: u16) -> StubRunner {
    let state = StubState {
        status: Arc::new(AtomicU16::new(status)),
        triggers: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/webhook/enrich", post(record_trigger))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    StubRunner {
        addr,
        status: state.status,
        triggers: state.triggers,
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub runner: StubRunner,
    pub store: Arc<JobStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("send request");
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn poll(&self, job_id: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url("/api/enrich"))
            .query(&[("jobId", job_id)])
            .send()
            .await
            .expect("send poll");
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Submits a job and returns its id, panicking if the submission fails.
    pub async fn start_job(&self, body: &Value) -> String {
        let (status, response) = self.post_json("/api/enrich", body).await;
        assert_eq!(status, 200, "unexpected start response: {}", response);
        response["jobId"]
            .as_str()
            .expect("jobId in response")
            .to_string()
    }
}

/// Boots the service on an ephemeral port, wired to a stub runner that
/// answers every trigger with `runner_status`.
pub async fn spawn_app(runner_status: u16) -> TestApp {
    let runner = spawn_stub_runner(runner_status).await;
    let webhook = WebhookRunner::new(
        Some(runner.webhook_url()),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .expect("webhook runner");

    let store = Arc::new(JobStore::new());
    let service = Arc::new(EnrichmentService::new(
        Arc::clone(&store),
        Arc::new(webhook),
        ApiKeys::new("free-m", "free-p", "free-r"),
    ));
    let app = build_router(AppState::new(service));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind app");
    let addr = listener.local_addr().expect("app addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("app server");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        runner,
        store,
    }
}
