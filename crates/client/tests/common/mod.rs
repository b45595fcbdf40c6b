//! In-process BizEval backend for integration tests.
//!
//! Serves the REST endpoints and the push socket from a script, and counts
//! every request so tests can assert on network traffic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bizeval_client::TrackerConfig;
use serde_json::{json, Value};

/// Poll interval used by every test tracker.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Job id handed out by the scripted submit endpoint.
pub const JOB_ID: i64 = 17;

pub struct Backend {
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub ws_connects: AtomicUsize,
    /// Number of upcoming submissions to reject with a 500.
    pub submit_failures: AtomicUsize,
    poll_script: Mutex<VecDeque<Value>>,
    last_poll: Mutex<Value>,
    push_frames: Option<Vec<Value>>,
    push_delay: Duration,
    push_close: bool,
}

impl Backend {
    /// A backend with no push socket that answers every poll with `pending`.
    pub fn new() -> Self {
        Self {
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            ws_connects: AtomicUsize::new(0),
            submit_failures: AtomicUsize::new(0),
            poll_script: Mutex::new(VecDeque::new()),
            last_poll: Mutex::new(json!({"status": "pending"})),
            push_frames: None,
            push_delay: Duration::ZERO,
            push_close: false,
        }
    }

    /// Answer polls with `answers` in order, then repeat the last one.
    pub fn with_polls(self, answers: Vec<Value>) -> Self {
        *self.poll_script.lock().unwrap() = answers.into();
        self
    }

    /// Accept push connections and send `frames` once connected.
    pub fn with_push(mut self, frames: Vec<Value>) -> Self {
        self.push_frames = Some(frames);
        self
    }

    /// Wait this long before each push frame.
    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = delay;
        self
    }

    /// Close the push socket from the server side after the last frame.
    pub fn with_push_close(mut self) -> Self {
        self.push_close = true;
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

/// Serve `backend` on an ephemeral port and return a matching config.
///
/// Push is enabled in the config even when the backend has no socket, so
/// tests exercise the connect-failure path.
pub async fn spawn(backend: Arc<Backend>) -> TrackerConfig {
    let mut app = Router::new()
        .route("/api/session/start", post(start_session))
        .route("/api/form/submit/{session_id}", post(submit_form))
        .route("/api/report/{job_id}", get(report_status));

    if backend.push_frames.is_some() {
        app = app.route("/ws/{session_id}", get(push_socket));
    }

    let app = app.with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TrackerConfig {
        api_url: format!("http://{addr}/api"),
        ws_url: format!("ws://{addr}"),
        poll_interval: TEST_POLL_INTERVAL,
        push_enabled: true,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn start_session() -> Json<Value> {
    Json(json!({"session_id": "sess-1", "ws_token": "tok", "status": "active"}))
}

async fn submit_form(
    State(backend): State<Arc<Backend>>,
    Path(_session_id): Path<String>,
    Json(_form): Json<Value>,
) -> Response {
    backend.submits.fetch_add(1, Ordering::SeqCst);

    let reject = backend
        .submit_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if reject {
        return (StatusCode::INTERNAL_SERVER_ERROR, "queue unavailable").into_response();
    }

    Json(json!({"job_id": JOB_ID, "status": "pending"})).into_response()
}

async fn report_status(
    State(backend): State<Arc<Backend>>,
    Path(_job_id): Path<String>,
) -> Json<Value> {
    backend.polls.fetch_add(1, Ordering::SeqCst);

    let next = backend.poll_script.lock().unwrap().pop_front();
    let answer = match next {
        Some(answer) => {
            *backend.last_poll.lock().unwrap() = answer.clone();
            answer
        }
        None => backend.last_poll.lock().unwrap().clone(),
    };
    Json(answer)
}

async fn push_socket(
    ws: WebSocketUpgrade,
    State(backend): State<Arc<Backend>>,
    Path(_session_id): Path<String>,
) -> Response {
    backend.ws_connects.fetch_add(1, Ordering::SeqCst);
    let frames = backend.push_frames.clone().unwrap_or_default();
    let delay = backend.push_delay;
    let close = backend.push_close;

    ws.on_upgrade(move |socket| stream_frames(socket, frames, delay, close))
}

async fn stream_frames(
    mut socket: WebSocket,
    frames: Vec<Value>,
    delay: Duration,
    close: bool,
) {
    for frame in frames {
        tokio::time::sleep(delay).await;
        if socket
            .send(Message::Text(frame.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    if close {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    // Hold the socket open until the client leaves.
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

pub fn report() -> Value {
    json!({
        "tracks": {
            "audience": {"segments": ["students"]},
            "global_competitors": {"competitors": []},
            "local_market": null
        },
        "consolidation": {
            "executive_summary": "A focused niche with room to grow.",
            "swot": {
                "strengths": ["Clear audience"],
                "weaknesses": ["Thin margins"],
                "opportunities": ["Campus partnerships"],
                "threats": ["Incumbents"]
            },
            "strategic_recommendations": [
                {"priority": "high", "category": "product", "recommendation": "Ship an MVP", "rationale": "Validate demand"},
                {"priority": "low", "category": "marketing", "recommendation": "Start a blog"}
            ],
            "overall_score": 7.5,
            "risk_level": "medium",
            "investment_readiness": "needs_validation"
        }
    })
}

pub fn frame(kind: &str, message: Option<&str>, data: Option<Value>) -> Value {
    let mut frame = json!({"type": kind});
    if let Some(message) = message {
        frame["message"] = json!(message);
    }
    if let Some(data) = data {
        frame["data"] = data;
    }
    frame
}
