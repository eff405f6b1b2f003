//! HTTP control API for the speech dispatcher.
//!
//! Lets a UI (or curl) switch voices, adjust rate and volume, and speak
//! ad-hoc text while the reader runs. Binds to 127.0.0.1 only.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::speech::dispatcher::SpeechDispatcher;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<SpeechDispatcher>,
    /// Last post number the reader has spoken.
    pub progress: Arc<AtomicI32>,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakRequest {
    text: String,
}

#[derive(Deserialize)]
struct VoiceRequest {
    name: String,
}

#[derive(Deserialize)]
struct RateRequest {
    value: i32,
}

#[derive(Deserialize)]
struct VolumeRequest {
    value: u8,
}

#[derive(Serialize)]
struct StatusResponse {
    voice: String,
    relay: bool,
    rate: i32,
    volume: u8,
    last_spoken: i32,
}

#[derive(Serialize)]
struct VoicesResponse {
    voices: Vec<String>,
    selected: String,
}

#[derive(Serialize)]
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

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/voices", get(handle_voices))
        .route("/voice", post(handle_voice))
        .route("/rate", post(handle_rate))
        .route("/volume", post(handle_volume))
        .route("/speak", post(handle_speak))
        .with_state(state)
}

/// Start the control API as a background tokio task.
pub async fn start_api(state: ApiState, port: u16) {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind control API on {addr}: {e}");
            return;
        }
    };
    info!("Control API listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Control API server error: {e}");
        }
    });
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let d = &state.dispatcher;
    Json(StatusResponse {
        voice: d.selected_voice(),
        relay: d.uses_relay(),
        rate: d.rate(),
        volume: d.volume(),
        last_spoken: state.progress.load(Ordering::Relaxed),
    })
}

async fn handle_voices(State(state): State<ApiState>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.dispatcher.voice_names().collect(),
        selected: state.dispatcher.selected_voice(),
    })
}

async fn handle_voice(
    State(state): State<ApiState>,
    Json(req): Json<VoiceRequest>,
) -> Json<SimpleResponse> {
    match state.dispatcher.select_voice(&req.name) {
        Ok(()) => Json(SimpleResponse::ok("ok")),
        Err(e) => Json(SimpleResponse::err(e.to_string())),
    }
}

async fn handle_rate(
    State(state): State<ApiState>,
    Json(req): Json<RateRequest>,
) -> Json<SimpleResponse> {
    state.dispatcher.set_rate(req.value);
    Json(SimpleResponse::ok("ok"))
}

async fn handle_volume(
    State(state): State<ApiState>,
    Json(req): Json<VolumeRequest>,
) -> Json<SimpleResponse> {
    state.dispatcher.set_volume(req.value);
    Json(SimpleResponse::ok("ok"))
}

async fn handle_speak(
    State(state): State<ApiState>,
    Json(req): Json<SpeakRequest>,
) -> Json<SimpleResponse> {
    if req.text.trim().is_empty() {
        return Json(SimpleResponse::err("empty text"));
    }
    info!("HTTP /speak: {} chars", req.text.chars().count());
    // Fire-and-forget
    drop(state.dispatcher.speak(&req.text));
    Json(SimpleResponse::ok("speaking"))
}
