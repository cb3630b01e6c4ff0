//! `agrow ask` — Answer one question from the terminal.

use agrow_config::AppConfig;
use agrow_core::context::ContextBundle;
use agrow_core::provider::TextCompleter;
use agrow_reasoning::Orchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read a context bundle from a JSON file.
fn load_bundle(path: &Path) -> Result<ContextBundle, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("{} is not valid JSON: {e}", path.display()))?;
    Ok(ContextBundle::from_value(value)?)
}

pub async fn run(
    message: String,
    context: Option<PathBuf>,
    show_trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set AGROW_API_KEYS (comma separated) or GROQ_API_KEY,");
        eprintln!("  or add api_keys to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let bundle = match &context {
        Some(path) => load_bundle(path)?,
        None => ContextBundle::new(),
    };

    let completer: Arc<dyn TextCompleter> = Arc::new(agrow_providers::build_gateway(&config));
    let orchestrator = Orchestrator::from_config(&config, completer)?;

    let answer = orchestrator.answer(&message, &bundle).await?;

    println!("\n[{}] {}\n", answer.routing_mode, answer.trace.intent_detected);
    println!("{}\n", answer.response);

    if !answer.trace.suggested_followups.is_empty() {
        println!("You could also ask:");
        for followup in &answer.trace.suggested_followups {
            println!("  • {followup}");
        }
        println!();
    }

    if show_trace {
        println!("{}", serde_json::to_string_pretty(&answer.trace)?);
    }

    Ok(())
}
