//! `chatrelay chat`: Interactive chat loop.
//!
//! One agent serves the whole session, so earlier turns stay in context.

use std::io::Write;

use chatrelay_agent::AgentFactory;
use chatrelay_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::RequestArgs;

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

pub async fn run(args: RequestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let default_bucket = config.storage.session_bucket.clone();
    let factory = AgentFactory::from_config(config)?;

    // The prompt is supplied per turn
    let request = args.to_request(String::new(), default_bucket.as_deref());
    let agent = factory.assemble(&request)?;
    tracing::debug!(session = %request.session_id, "Chat session started");

    println!();
    println!("  chatrelay, interactive mode");
    println!();
    println!("  Model:        {}", agent.model_config().model_id);
    println!("  Personality:  {}", factory.personality_for(&request));
    println!("  Session:      {}", request.session_id);
    println!(
        "  History:      {}",
        if agent.history().is_persistent() { "S3" } else { "in memory" }
    );
    if !agent.tool_names().is_empty() {
        println!("  Tools:        {}", agent.tool_names().join(", "));
    }
    println!();
    println!("  Type 'quit', 'exit' or 'q' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&prompt.to_lowercase().as_str()) {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;

        let mut fragments = agent.stream(prompt);
        while let Some(fragment) = fragments.recv().await {
            match fragment {
                Ok(text) => {
                    print!("{text}");
                    std::io::stdout().flush()?;
                }
                Err(e) => {
                    println!();
                    eprintln!("  [Error] {e}");
                }
            }
        }
        println!();
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
