use clap::{Parser, Subcommand};

/// Civic-AI backend server.
#[derive(Parser, Debug)]
#[command(name = "civic-ai", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API (the default)
    Serve,
    /// Store the LLM API key in the OS keyring
    SetApiKey {
        /// The key to store
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => civic_ai_lib::run().await,
        Command::SetApiKey { key } => civic_ai_lib::store_api_key(&key),
    }
}
