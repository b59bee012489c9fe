//! HTTP gateway for chatrelay.
//!
//! Two routes, the contract of a hosted agent runtime:
//!
//! - `GET  /ping`: health check
//! - `POST /invocations`: run one prompt and stream the reply
//!
//! Built on Axum; every invocation assembles its own agent.

pub mod invocations;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{Method, header},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use chatrelay_agent::AgentFactory;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub factory: AgentFactory,
    /// Unix time the current health status took effect
    pub status_since: i64,
}

impl GatewayState {
    pub fn new(factory: AgentFactory) -> Self {
        Self {
            factory,
            status_since: chrono::Utc::now().timestamp(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let max_body_bytes = state.factory.config().gateway.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/invocations", post(invocations::invocations_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// The model, retrieval and storage clients are built once and shared by
/// every request's agent.
pub async fn start(config: chatrelay_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let factory = AgentFactory::from_config(config)?;
    let app = build_router(Arc::new(GatewayState::new(factory)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub time_of_last_update: i64,
}

async fn ping_handler(State(state): State<SharedState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "Healthy".into(),
        time_of_last_update: state.status_since,
    })
}
