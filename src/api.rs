//! REST API Server for the command assistant
//!
//! Exposes the router, the open flow and the transcript over HTTP
//! Integrates with the browser UI

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AssistantError;
use crate::flows::FlowEdit;
use crate::models::RawInput;
use crate::pipeline::Pacing;
use crate::router::IntentRouter;
use crate::state::AppController;

const DEFAULT_SESSION_SEED: &str = "default-session";

pub const DEFAULT_MAX_SESSIONS: usize = 1000;
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub session_id: Option<String>,
    pub edit: FlowEdit,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type Reply = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> Reply {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn failed(e: AssistantError) -> Reply {
    let status = match e {
        AssistantError::NoActiveFlow => StatusCode::NOT_FOUND,
        AssistantError::InvalidTransition(_) => StatusCode::CONFLICT,
        AssistantError::InvalidEdit(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = %status, error = %e, "Request failed");
    (status, Json(ApiResponse::error(e.to_string())))
}

/// =============================
/// API State
/// =============================

struct Session {
    controller: Arc<Mutex<AppController>>,
    last_seen: Instant,
}

/// One controller per client session. Sessions idle longer than
/// `session_idle` are dropped, and at most `max_sessions` are kept.
#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<IntentRouter>,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pacing: Pacing,
    transcript_capacity: usize,
    max_sessions: usize,
    session_idle: Duration,
}

impl ApiState {
    pub fn new(router: Arc<IntentRouter>, pacing: Pacing, transcript_capacity: usize) -> Self {
        Self {
            router,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            pacing,
            transcript_capacity,
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }

    pub fn with_session_limits(mut self, max_sessions: usize, session_idle: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.session_idle = session_idle;
        self
    }

    async fn session(&self, session_id: Option<&str>) -> Arc<Mutex<AppController>> {
        let id = parse_or_stable_uuid(session_id, DEFAULT_SESSION_SEED);
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        let controller = match sessions.get_mut(&id) {
            Some(session) => {
                session.last_seen = now;
                session.controller.clone()
            }
            None => {
                info!(session_id = %id, active = sessions.len(), "New session");
                let controller = Arc::new(Mutex::new(AppController::new(
                    self.pacing,
                    self.transcript_capacity,
                )));
                sessions.insert(
                    id,
                    Session {
                        controller: controller.clone(),
                        last_seen: now,
                    },
                );
                controller
            }
        };

        self.evict(&mut sessions, id, now);
        controller
    }

    /// Drop idle sessions, then the least recently used ones beyond the cap.
    /// `keep` is the session being served and is never evicted.
    fn evict(&self, sessions: &mut HashMap<Uuid, Session>, keep: Uuid, now: Instant) {
        let before = sessions.len();
        sessions.retain(|id, s| *id == keep || now.duration_since(s.last_seen) <= self.session_idle);

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(id, _)| **id != keep)
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        if sessions.len() < before {
            debug!(evicted = before - sessions.len(), active = sessions.len(), "Sessions evicted");
        }
    }
}

/// =============================
/// Helpers - Session Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Command Endpoint
/// =============================

async fn submit_command(
    State(state): State<ApiState>,
    Json(req): Json<CommandRequest>,
) -> Reply {
    info!("Received command: {}", req.text);

    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Command text is empty".into())),
        );
    }

    let session = state.session(req.session_id.as_deref()).await;
    // Held across the responder call: one batch at a time per session.
    let mut app = session.lock().await;
    let outcome = state.router.submit(&mut app, RawInput::new(req.text)).await;

    ok(outcome)
}

/// =============================
/// Flow Endpoints
/// =============================

async fn get_flow(State(state): State<ApiState>, Query(q): Query<SessionRequest>) -> Reply {
    let session = state.session(q.session_id.as_deref()).await;
    let app = session.lock().await;
    ok(app.active_flow())
}

async fn confirm_flow(
    State(state): State<ApiState>,
    Json(req): Json<SessionRequest>,
) -> Reply {
    let session = state.session(req.session_id.as_deref()).await;
    let mut app = session.lock().await;
    match app.confirm_flow() {
        Ok(view) => ok(view),
        Err(e) => failed(e),
    }
}

async fn edit_flow(State(state): State<ApiState>, Json(req): Json<EditRequest>) -> Reply {
    let session = state.session(req.session_id.as_deref()).await;
    let mut app = session.lock().await;
    match app.edit_flow(req.edit) {
        Ok(view) => ok(view),
        Err(e) => failed(e),
    }
}

async fn close_flow(State(state): State<ApiState>, Json(req): Json<SessionRequest>) -> Reply {
    let session = state.session(req.session_id.as_deref()).await;
    let mut app = session.lock().await;
    match app.close_flow() {
        Ok(outcome) => ok(outcome),
        Err(e) => failed(e),
    }
}

/// =============================
/// Transcript Endpoint
/// =============================

async fn get_transcript(
    State(state): State<ApiState>,
    Query(q): Query<SessionRequest>,
) -> Reply {
    let session = state.session(q.session_id.as_deref()).await;
    let app = session.lock().await;
    let turns: Vec<_> = app.transcript().turns().collect();
    ok(turns)
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/command", post(submit_command))
        .route("/api/flow", get(get_flow))
        .route("/api/flow/confirm", post(confirm_flow))
        .route("/api/flow/edit", post(edit_flow))
        .route("/api/flow/close", post(close_flow))
        .route("/api/transcript", get(get_transcript))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState, port: u16) -> crate::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
