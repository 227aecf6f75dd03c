//! Interactive console entry point.

mod console;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use parley_config::DEFAULT_CONFIG_PATH;

use crate::console::Console;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Chat with OpenAI-compatible or Anthropic models from the terminal", long_about = None)]
struct Cli {
    /// Configuration file to restore and save.
    #[arg(long, env = "PARLEY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Diagnostics go to stderr at `warn` so they stay out of the conversation.
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout(), cli.config);
    console.run().await?;

    Ok(())
}
