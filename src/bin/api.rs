use crypto_command_assistant::{
    api::{start_server, ApiState},
    config::AssistantConfig,
    responder::{CannedResponder, FallbackResponder, GeminiResponder},
    router::IntentRouter,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();
    let config = AssistantConfig::from_env();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("🚀 Crypto Command Assistant - API Server");
    info!("📍 Port: {}", config.port);

    let responder: Arc<dyn FallbackResponder> = match config.gemini_api_key.clone() {
        Some(key) => Arc::new(GeminiResponder::new(key)?),
        None => {
            warn!("GEMINI_API_KEY not set, using canned replies (see .env.example)");
            Arc::new(CannedResponder::new())
        }
    };

    let router = Arc::new(IntentRouter::new(Some(responder)).with_timeout(config.fallback_timeout));
    let state = ApiState::new(router, config.pacing, config.transcript_capacity)
        .with_session_limits(config.max_sessions, config.session_idle);

    info!(
        tick_ms = config.pacing.tick.as_millis() as u64,
        stage_ms = config.pacing.stage_dwell.as_millis() as u64,
        timeout_secs = config.fallback_timeout.as_secs(),
        max_sessions = config.max_sessions,
        "✅ Router initialized"
    );
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
