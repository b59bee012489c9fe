//! chatrelay CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway (`/invocations`, `/ping`)
//! - `chat`: Interactive chat with one agent
//! - `invoke`: Run one prompt, print the event stream as JSON lines
//! - `config`: Show the effective configuration or write the default file

use clap::{Parser, Subcommand};

mod commands;

use commands::RequestArgs;

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "chatrelay: streaming chat agents on Amazon Bedrock",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat with an agent interactively
    Chat {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Send a single prompt and print the event stream
    Invoke {
        /// The prompt to send
        prompt: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show the effective configuration (secrets redacted)
    Config {
        /// Write the default configuration file instead
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { request } => commands::chat::run(request).await?,
        Commands::Invoke { prompt, request } => commands::invoke::run(prompt, request).await?,
        Commands::Config { init: true } => commands::config_cmd::init().await?,
        Commands::Config { init: false } => commands::config_cmd::show().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn invoke_parses_request_flags() {
        let cli = Cli::try_parse_from([
            "chatrelay", "invoke", "hello", "--personality", "fomc", "--session", "alice-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Invoke { prompt, request } => {
                assert_eq!(prompt, "hello");
                assert_eq!(request.personality.as_deref(), Some("fomc"));
                assert_eq!(request.session.as_deref(), Some("alice-1"));
                assert!(request.bucket.is_none());
            }
            _ => panic!("expected invoke"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["chatrelay", "serve", "--port", "9000", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }
}
