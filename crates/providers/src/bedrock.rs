//! Amazon Bedrock Converse provider.
//!
//! Uses the `converse-stream` operation, which speaks one request shape for
//! every model family Bedrock hosts.
//!
//! Features:
//! - Bearer (Bedrock API key) or SigV4 authentication
//! - System prompt as a top-level `system` block list
//! - Native tool use with `toolUse` / `toolResult` content blocks
//! - Streaming via AWS binary event-stream frames
//! - Reasoning ("thinking") via `additionalModelRequestFields`

use async_trait::async_trait;
use chatrelay_aws::eventstream::{EventStreamDecoder, Frame};
use chatrelay_aws::{AwsAuth, uri_encode};
use chatrelay_core::error::ProviderError;
use chatrelay_core::message::{Message, MessageToolCall, Role};
use chatrelay_core::provider::*;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const SERVICE: &str = "bedrock";

/// Bedrock Converse streaming provider.
pub struct BedrockProvider {
    name: String,
    region: String,
    endpoint: String,
    auth: AwsAuth,
    client: reqwest::Client,
}

impl BedrockProvider {
    /// Create a provider for `region` using the regional runtime endpoint.
    pub fn new(region: impl Into<String>, auth: AwsAuth) -> Result<Self, ProviderError> {
        let region = region.into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // reasoning models can be slow
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "bedrock".into(),
            endpoint: format!("https://bedrock-runtime.{region}.amazonaws.com"),
            region,
            auth,
            client,
        })
    }

    /// Use a custom endpoint (e.g., a VPC endpoint or a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn stream_url(&self, model_id: &str) -> Result<reqwest::Url, ProviderError> {
        let url = format!(
            "{}/model/{}/converse-stream",
            self.endpoint,
            uri_encode(model_id, true)
        );
        reqwest::Url::parse(&url).map_err(|e| ProviderError::NotConfigured(format!("{url}: {e}")))
    }
}

/// Build the Converse request body.
pub fn build_request_body(request: &ProviderRequest) -> Value {
    let config = &request.config;

    // System-role messages are folded into the top-level system blocks.
    let mut system: Vec<Value> = request
        .system
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| json!({ "text": s }))
        .collect();
    system.extend(
        request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| json!({ "text": m.content })),
    );

    let mut inference = json!({
        "maxTokens": config.max_tokens,
        "temperature": config.temperature,
    });
    if let Some(top_p) = config.top_p {
        inference["topP"] = json!(top_p);
    }

    let mut body = json!({
        "messages": to_api_messages(&request.messages),
        "inferenceConfig": inference,
    });

    if !system.is_empty() {
        body["system"] = Value::Array(system);
    }

    if !request.tools.is_empty() {
        body["toolConfig"] = json!({ "tools": to_api_tools(&request.tools) });
    }

    let mut additional = config.request_metadata.clone();
    if let Some(thinking) = config.thinking {
        additional.insert(
            "thinking".into(),
            json!({ "type": "enabled", "budget_tokens": thinking.budget_tokens }),
        );
    }
    if !additional.is_empty() {
        body["additionalModelRequestFields"] = Value::Object(additional);
    }

    body
}

/// Convert messages to Converse messages.
///
/// Converse only knows `user` and `assistant`; tool results travel as user
/// content, and consecutive same-role messages are merged into one.
fn to_api_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => continue,
            Role::User => ("user", text_block(&msg.content)),
            Role::Tool => {
                let status = if msg.is_error { "error" } else { "success" };
                (
                    "user",
                    vec![json!({
                        "toolResult": {
                            "toolUseId": msg.tool_call_id.clone().unwrap_or_default(),
                            "content": [{ "text": msg.content }],
                            "status": status,
                        }
                    })],
                )
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                if let Some(reasoning) = &msg.reasoning {
                    let mut reasoning_text = json!({ "text": reasoning.text });
                    if let Some(signature) = &reasoning.signature {
                        reasoning_text["signature"] = json!(signature);
                    }
                    blocks.push(json!({ "reasoningContent": { "reasoningText": reasoning_text } }));
                }
                blocks.extend(text_block(&msg.content));
                for tc in &msg.tool_calls {
                    let input: Value = serde_json::from_str(&tc.arguments).unwrap_or_else(|_| json!({}));
                    blocks.push(json!({
                        "toolUse": { "toolUseId": tc.id, "name": tc.name, "input": input }
                    }));
                }
                ("assistant", blocks)
            }
        };

        if blocks.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => out.push((role, blocks)),
        }
    }

    out.into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect()
}

fn text_block(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![json!({ "text": text })]
    }
}

fn to_api_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "toolSpec": {
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": { "json": t.parameters },
                }
            })
        })
        .collect()
}

/// Map a non-200 response to a provider error.
fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(if body.is_empty() {
            "Bedrock rejected the credentials".into()
        } else {
            body
        }),
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[derive(Default)]
struct PendingToolUse {
    id: String,
    name: String,
    input: String,
}

/// Converts decoded Converse events into stream chunks.
///
/// Text and reasoning deltas are emitted as they arrive; tool calls are
/// accumulated and delivered with the final chunk, once their input JSON
/// is complete.
#[derive(Default)]
pub struct ConverseStreamState {
    pending_tool: Option<PendingToolUse>,
    tool_calls: Vec<MessageToolCall>,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
}

impl ConverseStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one frame. Exception frames become errors.
    pub fn handle_frame(&mut self, frame: &Frame) -> Result<Option<StreamChunk>, ProviderError> {
        let event_type = frame.event_type().unwrap_or_default();
        let payload: Value = if frame.payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&frame.payload)
                .map_err(|e| ProviderError::ModelError(format!("invalid {event_type} payload: {e}")))?
        };

        if frame.is_exception() {
            let message = payload["message"]
                .as_str()
                .or_else(|| payload["Message"].as_str())
                .unwrap_or("no message");
            warn!(exception = %event_type, %message, "Bedrock stream exception");
            return Err(match event_type {
                "throttlingException" => ProviderError::RateLimited { retry_after_secs: 5 },
                _ => ProviderError::ModelError(format!("{event_type}: {message}")),
            });
        }

        Ok(self.handle_event(event_type, &payload))
    }

    /// Handle one decoded event.
    pub fn handle_event(&mut self, event_type: &str, payload: &Value) -> Option<StreamChunk> {
        match event_type {
            "contentBlockStart" => {
                let tool_use = &payload["start"]["toolUse"];
                if tool_use.is_object() {
                    self.finish_tool_use();
                    self.pending_tool = Some(PendingToolUse {
                        id: tool_use["toolUseId"].as_str().unwrap_or_default().to_string(),
                        name: tool_use["name"].as_str().unwrap_or_default().to_string(),
                        input: String::new(),
                    });
                }
                None
            }
            "contentBlockDelta" => {
                let delta = &payload["delta"];
                if let Some(text) = delta["text"].as_str() {
                    return Some(StreamChunk::text(text));
                }
                if let Some(partial) = delta["toolUse"]["input"].as_str() {
                    if let Some(tool) = self.pending_tool.as_mut() {
                        tool.input.push_str(partial);
                    }
                    return None;
                }
                let reasoning = &delta["reasoningContent"];
                if reasoning.is_object() {
                    return Some(StreamChunk {
                        reasoning: reasoning["text"].as_str().map(str::to_string),
                        reasoning_signature: reasoning["signature"].as_str().map(str::to_string),
                        ..StreamChunk::default()
                    });
                }
                trace!(?delta, "Ignoring unknown Converse delta");
                None
            }
            "contentBlockStop" => {
                self.finish_tool_use();
                None
            }
            "messageStop" => {
                self.finish_tool_use();
                self.stop_reason = Some(StopReason::from_wire(
                    payload["stopReason"].as_str().unwrap_or("end_turn"),
                ));
                None
            }
            "metadata" => {
                let usage = &payload["usage"];
                if usage.is_object() {
                    let prompt = usage["inputTokens"].as_u64().unwrap_or(0) as u32;
                    let completion = usage["outputTokens"].as_u64().unwrap_or(0) as u32;
                    self.usage = Some(Usage {
                        prompt_tokens: prompt,
                        completion_tokens: completion,
                        total_tokens: usage["totalTokens"]
                            .as_u64()
                            .map(|t| t as u32)
                            .unwrap_or(prompt + completion),
                    });
                }
                None
            }
            // messageStart carries only the role
            _ => None,
        }
    }

    fn finish_tool_use(&mut self) {
        if let Some(tool) = self.pending_tool.take() {
            self.tool_calls.push(MessageToolCall {
                id: tool.id,
                name: tool.name,
                arguments: if tool.input.is_empty() { "{}".into() } else { tool.input },
            });
        }
    }

    /// The final chunk, once the byte stream has ended.
    ///
    /// A stream that ends without `messageStop` was cut off.
    pub fn finish(mut self) -> Result<StreamChunk, ProviderError> {
        self.finish_tool_use();
        let stop_reason = self.stop_reason.ok_or_else(|| {
            ProviderError::StreamInterrupted("stream ended before messageStop".into())
        })?;
        Ok(StreamChunk {
            tool_calls: self.tool_calls,
            usage: self.usage,
            ..StreamChunk::finished(stop_reason)
        })
    }
}

/// Decode an event-stream body and forward chunks to `tx`.
///
/// Returns as soon as the receiver is dropped.
pub async fn pump_event_stream<S, B, E>(
    byte_stream: S,
    tx: mpsc::Sender<Result<StreamChunk, ProviderError>>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut byte_stream = std::pin::pin!(byte_stream);
    let mut decoder = EventStreamDecoder::new();
    let mut state = ConverseStreamState::new();

    while let Some(next) = byte_stream.next().await {
        let bytes = match next {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };
        decoder.push(bytes.as_ref());

        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                        .await;
                    return;
                }
            };
            match state.handle_frame(&frame) {
                Ok(Some(chunk)) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        debug!("Chunk receiver dropped, stopping Bedrock stream");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }

    let _ = tx.send(state.finish()).await;
}

#[async_trait]
impl Provider for BedrockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = self.stream_url(&request.config.model_id)?;
        let body = serde_json::to_vec(&build_request_body(&request))
            .map_err(|e| ProviderError::ModelError(format!("request serialization: {e}")))?;

        debug!(
            provider = "bedrock",
            model = %request.config.model_id,
            auth = self.auth.kind(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = chatrelay_aws::authorized_request(
            &self.client,
            reqwest::Method::POST,
            url,
            body,
            &self.auth,
            &self.region,
            SERVICE,
        )
        .map_err(|e| ProviderError::AuthenticationFailed(e.to_string()))?
        .header("content-type", "application/json")
        .header("accept", "application/vnd.amazon.eventstream")
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_event_stream(response.bytes_stream(), tx));
        Ok(rx)
    }
}
