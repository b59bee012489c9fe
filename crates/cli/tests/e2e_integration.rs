//! End-to-end tests for the chatrelay pipeline.
//!
//! These drive the HTTP gateway with fakes standing in for Bedrock, the
//! knowledge bases and S3: request parsing, agent assembly, the tool loop,
//! history persistence and the event relay all run for real.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chatrelay_agent::AgentFactory;
use chatrelay_config::AppConfig;
use chatrelay_core::error::{ProviderError, SessionError};
use chatrelay_core::message::{Message, MessageToolCall, Role};
use chatrelay_core::provider::{ChunkReceiver, Provider, ProviderRequest, StopReason, StreamChunk};
use chatrelay_gateway::{GatewayState, build_router};
use chatrelay_memory::ObjectStore;
use chatrelay_tools::{RetrievalClient, RetrievalError, RetrievalQuery, RetrievedSnippet};

// ── Fakes ────────────────────────────────────────────────────────────────

/// Answers with a knowledge-base search first when tools are offered,
/// then with text quoting whatever the tool returned.
#[derive(Default)]
struct SearchingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
}

#[async_trait::async_trait]
impl Provider for SearchingProvider {
    fn name(&self) -> &str {
        "e2e_fake"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let last = request.messages.last().cloned();
        let tool_name = request.tools.first().map(|t| t.name.clone());
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(8);
        match (last, tool_name) {
            (Some(last), Some(tool_name)) if last.role == Role::User => {
                tx.try_send(Ok(StreamChunk {
                    tool_calls: vec![MessageToolCall {
                        id: "tooluse_1".into(),
                        name: tool_name,
                        arguments: serde_json::json!({"query": last.content}).to_string(),
                    }],
                    ..StreamChunk::finished(StopReason::ToolUse)
                }))
                .unwrap();
            }
            (Some(last), _) if last.role == Role::Tool => {
                tx.try_send(Ok(StreamChunk::text("According to the minutes: ")))
                    .unwrap();
                tx.try_send(Ok(StreamChunk::text(last.content))).unwrap();
                tx.try_send(Ok(StreamChunk::finished(StopReason::EndTurn)))
                    .unwrap();
            }
            _ => {
                tx.try_send(Ok(StreamChunk::text("Hi there")))
                    .unwrap();
                tx.try_send(Ok(StreamChunk::finished(StopReason::EndTurn)))
                    .unwrap();
            }
        }
        Ok(rx)
    }
}

/// Returns one relevant and one irrelevant passage for any query.
#[derive(Default)]
struct FakeKnowledgeBases {
    calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait::async_trait]
impl RetrievalClient for FakeKnowledgeBases {
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        region: &str,
        query: &RetrievalQuery,
    ) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        self.calls.lock().unwrap().push((
            knowledge_base_id.to_string(),
            region.to_string(),
            query.text.clone(),
        ));
        Ok(vec![
            RetrievedSnippet {
                text: "The Committee decided to maintain the target range.".into(),
                score: Some(0.82),
                location: None,
            },
            RetrievedSnippet {
                text: "Unrelated passage.".into(),
                score: Some(0.1),
                location: None,
            },
        ])
    }
}

#[derive(Default)]
struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.objects.lock().unwrap().get(&format!("{bucket}/{key}")).cloned())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), SessionError> {
        self.objects.lock().unwrap().insert(format!("{bucket}/{key}"), body);
        Ok(())
    }
}

struct Harness {
    provider: Arc<SearchingProvider>,
    knowledge_bases: Arc<FakeKnowledgeBases>,
    store: Arc<MemoryObjectStore>,
    app: axum::Router,
}

fn harness() -> Harness {
    let provider = Arc::new(SearchingProvider::default());
    let knowledge_bases = Arc::new(FakeKnowledgeBases::default());
    let store = Arc::new(MemoryObjectStore::default());

    let factory = AgentFactory::new(
        Arc::new(AppConfig::default()),
        provider.clone(),
        knowledge_bases.clone(),
        Some(store.clone() as Arc<dyn ObjectStore>),
    );
    let app = build_router(Arc::new(GatewayState::new(factory)));

    Harness {
        provider,
        knowledge_bases,
        store,
        app,
    }
}

async fn invoke(app: &axum::Router, payload: serde_json::Value) -> (StatusCode, Vec<serde_json::Value>) {
    let req = Request::builder()
        .method("POST")
        .uri("/invocations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let events = String::from_utf8(body.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    (status, events)
}

fn token_text(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .filter(|e| e["type"] == "token")
        .map(|e| e["text"].as_str().unwrap())
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_fomc_question_searches_and_persists() {
    let h = harness();

    let (status, events) = invoke(
        &h.app,
        serde_json::json!({
            "prompt": "What did the Committee decide?",
            "personality": "fomc",
            "session_id": "alice-2024abc",
            "s3sessionbucket": "mybucket",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.first().unwrap()["type"], "start");
    assert_eq!(events.last().unwrap()["type"], "done");
    assert!(events.iter().all(|e| e["type"] != "error"));
    assert_eq!(
        token_text(&events),
        "According to the minutes: The Committee decided to maintain the target range."
    );

    // The FOMC knowledge base was searched with the caller's question
    let calls = h.knowledge_bases.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(
            "P7J0PZOXSE".to_string(),
            "us-east-1".to_string(),
            "What did the Committee decide?".to_string()
        )]
    );

    // Two model calls: one asking for the tool, one answering
    let requests = h.provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].name, "fomc_kb_search");
    assert!(requests[0].system.as_deref().unwrap().contains("Federal Open Market Committee"));
    drop(requests);

    // The whole turn is stored under the session's namespace
    let objects = h.store.objects.lock().unwrap();
    let saved = objects
        .get("mybucket/alice/session_2024abc/messages.json")
        .expect("session saved");
    let history: Vec<Message> = serde_json::from_slice(saved).unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role.clone()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(history[2].tool_call_id.as_deref(), Some("tooluse_1"));
    assert!(!history[2].content.contains("Unrelated passage."));
}

#[tokio::test]
async fn e2e_second_turn_sees_stored_history() {
    let h = harness();
    let payload = |prompt: &str| {
        serde_json::json!({
            "prompt": prompt,
            "session_id": "noHyphenHere",
            "s3sessionbucket": "mybucket",
        })
    };

    let (_, first) = invoke(&h.app, payload("Hello")).await;
    assert_eq!(token_text(&first), "Hi there");
    let (_, second) = invoke(&h.app, payload("Hello again")).await;
    assert_eq!(token_text(&second), "Hi there");

    let requests = h.provider.requests.lock().unwrap();
    let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Hello", "Hi there", "Hello again"]);
    assert!(requests[1].tools.is_empty());

    assert!(
        h.store
            .objects
            .lock()
            .unwrap()
            .contains_key("mybucket/default/session_noHyphenHere/messages.json")
    );
}

#[tokio::test]
async fn e2e_without_bucket_nothing_is_stored() {
    let h = harness();

    let (status, events) = invoke(&h.app, serde_json::json!({"prompt": "Hello"})).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["start", "token", "done"]);
    assert!(h.store.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_ping() {
    let h = harness();
    let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
    let response = h.app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "Healthy");
    assert!(json["time_of_last_update"].as_i64().unwrap() > 0);
}
