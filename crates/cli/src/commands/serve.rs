//! `agrow serve` — Start the HTTP front door.

use agrow_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🌾 Agrow API");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Credentials: {}", config.api_keys.len());
    println!("   Deep Dive protocol: {}", config.routing.deep_dive_protocol);
    println!("   Storage: {}", config.storage.backend);

    agrow_api::start(config).await?;

    Ok(())
}
