pub mod chat;
pub mod search;
pub mod serve;

use supportdesk_config::AppConfig;

/// Load configuration, turning failures into a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
