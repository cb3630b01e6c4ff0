//! `agrow transcribe` — Speech to text through the completion gateway.

use agrow_config::AppConfig;
use agrow_core::provider::{AudioInput, TextCompleter};
use std::path::{Path, PathBuf};

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

pub async fn run(
    file: PathBuf,
    language: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        return Err("No API key configured. Set AGROW_API_KEYS or run `agrow onboard`.".into());
    }

    let bytes = std::fs::read(&file).map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.bin")
        .to_string();

    let audio = AudioInput {
        bytes,
        file_name,
        mime_type: mime_for(&file).to_string(),
        language,
    };

    let gateway = agrow_providers::build_gateway(&config);
    let text = gateway.transcribe(audio).await?;
    println!("{}", text.trim());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("note.WAV")), "audio/wav");
        assert_eq!(mime_for(Path::new("clip.webm")), "audio/webm");
        assert_eq!(mime_for(Path::new("raw")), "application/octet-stream");
    }
}
