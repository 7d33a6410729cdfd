//! `supportdesk serve`: Start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("SupportDesk Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Invoke:    POST /customer-support/invoke");
    println!("   Knowledge: {}", config.knowledge_base_path.display());

    supportdesk_gateway::start(config).await?;

    Ok(())
}
