//! `chatrelay invoke`: Run one prompt and print the event stream as JSON lines.

use chatrelay_agent::{AgentFactory, StreamEvent, relay};
use chatrelay_config::AppConfig;

use super::RequestArgs;

pub async fn run(prompt: String, args: RequestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let default_bucket = config.storage.session_bucket.clone();
    let factory = AgentFactory::from_config(config)?;

    let request = args.to_request(prompt, default_bucket.as_deref());
    let agent = factory.assemble(&request)?;

    let mut events = relay(agent.stream(request.prompt));
    let mut failed = false;
    while let Some(event) = events.recv().await {
        failed |= matches!(event, StreamEvent::Error { .. });
        println!("{}", serde_json::to_string(&event)?);
    }

    if failed {
        return Err("invocation failed; see the error event above".into());
    }
    Ok(())
}
