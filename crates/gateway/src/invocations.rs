//! `POST /invocations`: run one prompt through a freshly assembled agent.
//!
//! Two payload shapes are accepted:
//!
//! - flat `{"prompt", "model", "personality", "session_id", "s3sessionbucket"}`
//!   ⇒ Server-Sent Events, one JSON [`StreamEvent`] per `data:` line
//! - `{"input": {"prompt": ...}}` ⇒ the raw model text as a chunked
//!   `text/plain` body
//!
//! [`StreamEvent`]: chatrelay_agent::StreamEvent

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use chatrelay_agent::{AgentRequest, relay};

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub async fn invocations_handler(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    if let Some(input) = payload.get("input") {
        return text_invocation(&state, input);
    }
    event_invocation(&state, payload)
}

/// Flat payload: stream typed events.
fn event_invocation(state: &SharedState, payload: Value) -> Response {
    let request: AgentRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {e}")),
    };

    let agent = match state.factory.assemble(&request) {
        Ok(agent) => agent,
        Err(e) => {
            error!(error = %e, "Agent assembly failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    info!(session = %request.session_id, "Streaming invocation");

    let events = relay(agent.stream(request.prompt));
    let stream = ReceiverStream::new(events).map(|event| SseEvent::default().json_data(&event));

    Sse::new(stream).into_response()
}

/// `{"input": {...}}` payload: stream plain text.
fn text_invocation(state: &SharedState, input: &Value) -> Response {
    let has_prompt = input
        .get("prompt")
        .and_then(Value::as_str)
        .is_some_and(|p| !p.is_empty());
    if !has_prompt {
        return error_response(StatusCode::BAD_REQUEST, "No prompt found in input");
    }

    let request: AgentRequest = match serde_json::from_value(input.clone()) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid input: {e}")),
    };

    let agent = match state.factory.assemble(&request) {
        Ok(agent) => agent,
        Err(e) => {
            error!(error = %e, "Agent assembly failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    info!(session = %request.session_id, "Text invocation");

    // A failure mid-stream aborts the body; the status line is already sent.
    let body = Body::from_stream(ReceiverStream::new(agent.stream(request.prompt)));
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
