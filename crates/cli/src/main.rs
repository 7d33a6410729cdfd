//! SupportDesk CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive or single-message support chat
//! - `serve`  : Start the HTTP gateway
//! - `search` : Query the knowledge base directly

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "supportdesk",
    about = "SupportDesk: tool-using customer support assistant",
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
    /// Chat with the support assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue a named session
        #[arg(long)]
        session: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Search the knowledge base
    Search {
        /// Text to look for in article titles and bodies
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message, session } => commands::chat::run(message, session).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Search { query } => commands::search::run(&query)?,
    }

    Ok(())
}
