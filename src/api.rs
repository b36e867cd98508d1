//! Local HTTP ingest API.
//!
//! A producer next to the platform event handlers: lets local tools and
//! webhook relays push messages or raw event payloads into the queue.
//! Runs on 127.0.0.1 only using axum.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::{EventRouter, Outcome};
use crate::library::SampleLibrary;
use crate::pipeline::worker::WorkerState;

#[derive(Clone)]
pub struct ApiState {
    pub events: EventRouter,
    pub worker_state: watch::Receiver<WorkerState>,
    pub library: Arc<SampleLibrary>,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakRequest {
    text: String,
}

#[derive(Serialize)]
struct StatusResponse {
    state: String,
    queue_depth: usize,
    sounds: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct SimpleResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            error: Some(message.into()),
        }
    }
}

impl From<Outcome> for SimpleResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Queued => Self::ok("queued"),
            Outcome::Ignored => Self::ok("ignored"),
            Outcome::Malformed(e) => Self::err(e),
            Outcome::Closed => Self::err("playback queue closed"),
        }
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/speak", post(handle_speak))
        .route("/redemption", post(handle_redemption))
        .route("/whisper", post(handle_whisper))
        .with_state(state)
}

/// Start the ingest API as a background tokio task, stopping on `cancel`.
pub async fn start_api(state: ApiState, port: u16, cancel: CancellationToken) {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind ingest API on {addr}: {e}");
            return;
        }
    };
    info!("Ingest API listening on {addr}");

    tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            warn!("Ingest API server error: {e}");
        }
    });
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.worker_state.borrow().to_string(),
        queue_depth: state.events.queue().len(),
        sounds: state.library.list(),
    })
}

async fn handle_speak(
    State(state): State<ApiState>,
    Json(req): Json<SpeakRequest>,
) -> Json<SimpleResponse> {
    if req.text.trim().is_empty() {
        return Json(SimpleResponse::err("empty text"));
    }
    info!("HTTP /speak: \"{}\"", req.text);
    Json(state.events.on_text(&req.text).into())
}

async fn handle_redemption(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> Json<SimpleResponse> {
    Json(state.events.on_redemption(&payload).into())
}

async fn handle_whisper(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> Json<SimpleResponse> {
    Json(state.events.on_whisper(&payload).into())
}
