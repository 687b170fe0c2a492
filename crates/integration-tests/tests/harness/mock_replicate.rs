//! Mock Replicate backend for integration tests
//!
//! Serves the predictions API with scripted replies and records every
//! prediction input. Also hosts a small PNG at `/files/out.png` so generated
//! output can be downloaded.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Bytes served at `/files/out.png`
pub const OUTPUT_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRmock";

/// What the next prediction request gets back
#[derive(Debug, Clone)]
pub enum Reply {
    /// Succeeded prediction with this output
    Output(Value),
    /// Succeeded prediction whose output is the hosted PNG
    HostedImage,
    /// Succeeded prediction whose output is this path on the mock
    HostedPath(&'static str),
    /// Failed prediction with this error message
    Failed(String),
    /// Non-2xx API response with a `detail` message
    Status(u16, String),
    /// Prediction still processing; the poll returns the hosted PNG
    Processing,
}

/// A recorded prediction request
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub input: Value,
    pub authorization: Option<String>,
}

pub struct MockReplicate {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    addr: SocketAddr,
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    poll_count: AtomicU32,
    file_count: AtomicU32,
}

impl MockState {
    fn image_url(&self) -> String {
        format!("http://{}/files/out.png", self.addr)
    }
}

impl MockReplicate {
    /// Start a mock whose every prediction succeeds with the hosted PNG
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Vec::new()).await
    }

    /// Start a mock that replays `script` before falling back to success
    pub async fn start_with(script: Vec<Reply>) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState {
            addr,
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            poll_count: AtomicU32::new(0),
            file_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/models/{owner}/{name}/predictions", routing::post(handle_create))
            .route("/v1/predictions/{id}", routing::get(handle_poll))
            .route("/files/out.png", routing::get(handle_file))
            .with_state(Arc::clone(&state));

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// API base URL including `/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// URL of the hosted output image
    pub fn image_url(&self) -> String {
        self.state.image_url()
    }

    /// Any path on the mock
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> u32 {
        self.state.poll_count.load(Ordering::Relaxed)
    }

    pub fn file_count(&self) -> u32 {
        self.state.file_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockReplicate {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn prediction(id: &str, status: &str, output: Value, error: Value, addr: SocketAddr) -> Value {
    json!({
        "id": id,
        "status": status,
        "output": output,
        "error": error,
        "urls": { "get": format!("http://{addr}/v1/predictions/{id}") },
    })
}

async fn handle_create(
    State(state): State<Arc<MockState>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let id = {
        let mut calls = state.calls.lock().unwrap();
        calls.push(Call {
            model: format!("{owner}/{name}"),
            input: body["input"].clone(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        });
        format!("pred-{}", calls.len())
    };

    let reply = state.script.lock().unwrap().pop_front().unwrap_or(Reply::HostedImage);

    match reply {
        Reply::Output(output) => Json(prediction(&id, "succeeded", output, Value::Null, state.addr)).into_response(),
        Reply::HostedImage => Json(prediction(
            &id,
            "succeeded",
            json!([state.image_url()]),
            Value::Null,
            state.addr,
        ))
        .into_response(),
        Reply::HostedPath(path) => Json(prediction(
            &id,
            "succeeded",
            json!([format!("http://{}{path}", state.addr)]),
            Value::Null,
            state.addr,
        ))
        .into_response(),
        Reply::Failed(message) => {
            Json(prediction(&id, "failed", Value::Null, json!(message), state.addr)).into_response()
        }
        Reply::Status(status, detail) => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "title": "error", "detail": detail })),
        )
            .into_response(),
        Reply::Processing => {
            Json(prediction(&id, "processing", Value::Null, Value::Null, state.addr)).into_response()
        }
    }
}

async fn handle_poll(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Json<Value> {
    let polls = state.poll_count.fetch_add(1, Ordering::Relaxed) + 1;

    // First poll still running, second one finished
    if polls < 2 {
        Json(prediction(&id, "processing", Value::Null, Value::Null, state.addr))
    } else {
        Json(prediction(&id, "succeeded", json!(state.image_url()), Value::Null, state.addr))
    }
}

async fn handle_file(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.file_count.fetch_add(1, Ordering::Relaxed);
    ([(header::CONTENT_TYPE, "image/png")], OUTPUT_PNG)
}
