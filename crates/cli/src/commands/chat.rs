//! `supportdesk chat`: Interactive or single-message support chat.

use std::io::Write;
use std::sync::Arc;

use supportdesk_agent::{SessionManager, TurnOutcome};
use supportdesk_config::AppConfig;
use supportdesk_core::event::EventBus;
use supportdesk_core::message::SessionId;
use supportdesk_knowledge::DocumentStore;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY       = 'sk-...'         (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY   = 'sk-or-v1-...'");
        eprintln!("    SUPPORTDESK_API_KEY  = 'sk-...'         (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let store = Arc::new(DocumentStore::load(&config.knowledge_base_path)?);
    let article_count = store.len();
    let tools = Arc::new(supportdesk_tools::default_registry(store)?);
    let tool_names = tools.names().join(", ");

    let router = supportdesk_providers::router::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let sessions = SessionManager::from_config(&config, provider, tools, Arc::new(EventBus::default()));
    let session_id = session.map(SessionId).unwrap_or_default();

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let outcome = sessions.handle(&session_id, &msg).await?;
        eprint!("\r              \r");
        println!("{}", outcome.reply);
        if outcome.handoff_requested {
            println!("Connecting you to a human agent now...");
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  SupportDesk: Customer Support Assistant");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {tool_names}");
    println!("  Knowledge: {article_count} articles");
    println!("  Session:   {session_id}");
    println!();
    println!("  Assistant > Hello! How can I help you today? (Type 'exit' to quit)");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "/exit" | "/quit") {
            break;
        }

        eprint!("  ...");
        match sessions.handle(&session_id, line).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                print_outcome(&outcome);
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Assistant > Goodbye!");
    println!();

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    println!();
    for line in outcome.reply.lines() {
        println!("  Assistant > {line}");
    }
    if outcome.handoff_requested {
        println!("  Connecting you to a human agent now...");
    }
    println!();
}
