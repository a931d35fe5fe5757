//! Common utilities for integration tests.
//!
//! Provides a stub of the scheduled events endpoint, process spawning helpers and
//! polling waits shared by the integration test modules.

use std::{
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing,
};
use serde_json::Value;
use tokio::net::TcpListener;

pub const EVENTS_PATH: &str = "/metadata/scheduledevents";

/// What the stub answers to GET requests.
#[derive(Debug, Clone)]
pub enum StubReply {
    Document(Value),
    NoContent,
    Raw(&'static str),
    Status(StatusCode),
}

#[derive(Clone)]
struct StubState {
    reply: Arc<Mutex<StubReply>>,
    approvals: Arc<Mutex<Vec<Value>>>,
    gets: Arc<AtomicUsize>,
    missing_metadata_header: Arc<AtomicUsize>,
}

/// In-process stand-in for the instance metadata service.
pub struct StubEndpoint {
    pub url: String,
    state: StubState,
}

impl StubEndpoint {
    pub async fn start(reply: StubReply) -> Self {
        let state = StubState {
            reply: Arc::new(Mutex::new(reply)),
            approvals: Arc::default(),
            gets: Arc::default(),
            missing_metadata_header: Arc::default(),
        };
        let app = Router::new()
            .route(
                EVENTS_PATH,
                routing::get(serve_document).post(record_approval),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub endpoint");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .expect("stub endpoint failed");
        });

        Self {
            url: format!("http://{addr}{EVENTS_PATH}?api-version=2020-07-01"),
            state,
        }
    }

    pub fn set_reply(&self, reply: StubReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    pub fn approvals(&self) -> Vec<Value> {
        self.state.approvals.lock().unwrap().clone()
    }

    pub fn gets(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    pub fn requests_without_metadata_header(&self) -> usize {
        self.state.missing_metadata_header.load(Ordering::SeqCst)
    }
}

async fn serve_document(State(state): State<StubState>, headers: HeaderMap) -> Response {
    state.gets.fetch_add(1, Ordering::SeqCst);
    if headers.get("Metadata").is_none_or(|value| value != "true") {
        state.missing_metadata_header.fetch_add(1, Ordering::SeqCst);
    }
    let reply = state.reply.lock().unwrap().clone();
    match reply {
        StubReply::Document(document) => Json(document).into_response(),
        StubReply::NoContent => StatusCode::OK.into_response(),
        StubReply::Raw(body) => body.into_response(),
        StubReply::Status(status) => status.into_response(),
    }
}

async fn record_approval(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    state.approvals.lock().unwrap().push(body);
    StatusCode::OK
}

/// A document with one reboot event starting `not_before` (RFC 1123, or empty).
pub fn reboot_document(incarnation: i64, not_before: &str) -> Value {
    serde_json::json!({
        "DocumentIncarnation": incarnation,
        "Events": [{
            "EventId": "602d9444-d2cd-49c7-8624-8643e7171297",
            "EventStatus": "Scheduled",
            "EventType": "Reboot",
            "ResourceType": "VirtualMachine",
            "Resources": ["FrontEnd_IN_0", "BackEnd_IN_0"],
            "NotBefore": not_before,
            "DurationInSeconds": -1,
            "Description": "",
            "EventSource": "Platform"
        }]
    })
}

/// Writes a config with short intervals pointing at `endpoint`, with lock and cache
/// files next to it.
pub fn write_fast_config(dir: &Path, endpoint: &str) -> PathBuf {
    let path = dir.join("scheduled_events.toml");
    std::fs::write(
        &path,
        format!(
            r#"
            endpoint = "{endpoint}"
            lock_path = "role.lock"
            cache_path = "cache.json"
            http_poll_interval_secs = 1
            lock_check_interval_secs = 1
            cache_expiry_secs = 5
            error_backoff_secs = 1
            request_timeout_secs = 5

            [notice]
            check_interval_secs = 1
            "#
        ),
    )
    .expect("failed to write config");
    path
}

/// Guard that kills and waits on a child process when dropped.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if self.0.kill().is_ok() {
            drop(self.0.wait());
        }
    }
}

pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_scheduled_events")
}

/// Spawn the `scheduled_events` binary with the given arguments, stdout piped.
pub fn spawn_scheduled_events(args: &[&str]) -> KillOnDrop {
    let child = Command::new(bin())
        .args(args)
        .env("SCHEDULED_EVENTS_INTEGRATION_TEST", "1")
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to start scheduled_events");
    KillOnDrop(child)
}

/// Run the binary to completion, returning its exit status success and stdout.
pub async fn run_scheduled_events(args: &[&str]) -> (bool, String) {
    let output = tokio::process::Command::new(bin())
        .args(args)
        .env("SCHEDULED_EVENTS_INTEGRATION_TEST", "1")
        .output()
        .await
        .expect("failed to run scheduled_events");
    (
        output.status.success(),
        String::from_utf8(output.stdout).expect("stdout is not UTF-8"),
    )
}

/// Wait until `path` exists or panic after `timeout_secs`.
pub async fn wait_for_file(path: &Path, timeout_secs: u64) {
    let start = Instant::now();
    while !path.exists() {
        assert!(
            start.elapsed() < Duration::from_secs(timeout_secs),
            "{} did not appear within timeout",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
