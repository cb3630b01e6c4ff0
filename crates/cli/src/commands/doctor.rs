//! `agrow doctor` — Diagnose configuration problems.

use agrow_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Agrow Doctor — Configuration Diagnostics");
    println!("===========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — defaults in use (run `agrow onboard`)");
        issues += 1;
    }

    match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");

            if config.has_api_key() {
                println!("  ✅ {} API credential(s) in the rotation pool", config.api_keys.len());
            } else {
                println!("  ❌ No API keys — set AGROW_API_KEYS");
                issues += 1;
            }

            match &config.aggregator.url {
                Some(url) => println!("  ✅ Context aggregator: {url}"),
                None => {
                    println!("  ⚠️  No aggregator URL — queries will run without field context");
                    issues += 1;
                }
            }

            println!(
                "  ✅ Routing: threshold {} / Deep Dive '{}'",
                config.routing.fast_lane_threshold, config.routing.deep_dive_protocol
            );
            println!("  ✅ Storage: {} ({})", config.storage.backend, config.storage.path);
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
