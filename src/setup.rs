//! Interactive setup wizard (`lingo setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    ApiKeysFileConfig, ConversationFileConfig, LingoConfigFile, VoiceFileConfig,
};
use crate::config::{LanguageLevel, ModelSize, VoiceGender, parse_language};
use crate::voice::supported_languages;

/// Mask a secret for display, keeping the first and last four characters
fn mask(key: &str) -> String {
    if key.len() > 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "****".to_string()
    }
}

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Lingo Setup\n");

    let existing = crate::config::file::load_config_file();
    let config_path = crate::config::file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/lingo/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Name
    let name: String = Input::new()
        .with_prompt("Your name")
        .with_initial_text(existing.name.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    // 2. Conversation language
    let languages: Vec<&str> = supported_languages().collect();
    let default_language = existing
        .conversation
        .language
        .as_deref()
        .and_then(|l| languages.iter().position(|&x| x == l))
        .unwrap_or(0);
    let language_idx = Select::new()
        .with_prompt("Conversation language")
        .items(&languages)
        .default(default_language)
        .interact()?;
    let language = parse_language(languages[language_idx])?;

    // 3. Proficiency level
    let levels: Vec<String> = LanguageLevel::all().map(LanguageLevel::label).collect();
    let default_level = existing
        .conversation
        .level
        .as_deref()
        .and_then(|l| l.parse::<LanguageLevel>().ok())
        .unwrap_or_default()
        .label();
    let level_idx = Select::new()
        .with_prompt("Speaking level (school grade)")
        .items(&levels)
        .default(levels.iter().position(|l| *l == default_level).unwrap_or(0))
        .interact()?;

    // 4. API key
    let existing_key = existing.api_keys.openai.as_deref();
    let prompt = existing_key.map_or_else(
        || "OpenAI API key (OPENAI_API_KEY)".to_string(),
        |k| format!("OpenAI API key (current: {}, leave blank to keep)", mask(k)),
    );
    let api_key_input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;
    let api_key = if api_key_input.trim().is_empty() {
        existing_key.map(str::to_string)
    } else {
        Some(api_key_input.trim().to_string())
    };

    // 5. Voice (optional)
    let enable_voice = Confirm::new()
        .with_prompt("Enable voice (speech in and out)?")
        .default(existing.voice.enabled.unwrap_or(true))
        .interact()?;

    let voice = if enable_voice {
        let backends = ["local", "api"];
        let backend_idx = Select::new()
            .with_prompt("Speech recognition")
            .items(&["local Whisper CLI", "OpenAI Whisper API"])
            .default(
                existing
                    .voice
                    .stt_backend
                    .as_deref()
                    .and_then(|b| backends.iter().position(|&x| x == b))
                    .unwrap_or(0),
            )
            .interact()?;

        let sizes: Vec<&str> = ModelSize::ALL.iter().map(|m| m.as_str()).collect();
        let size_idx = Select::new()
            .with_prompt("Whisper model size (local only)")
            .items(&sizes)
            .default(
                existing
                    .voice
                    .model_size
                    .as_deref()
                    .and_then(|s| sizes.iter().position(|&x| x == s))
                    .unwrap_or(0),
            )
            .interact()?;

        let genders = [VoiceGender::Female, VoiceGender::Male];
        let gender_labels: Vec<&str> = genders.iter().map(|g| g.as_str()).collect();
        let gender_idx = Select::new()
            .with_prompt("Voice")
            .items(&gender_labels)
            .default(
                existing
                    .voice
                    .gender
                    .as_deref()
                    .and_then(|g| g.parse::<VoiceGender>().ok())
                    .and_then(|g| genders.iter().position(|&x| x == g))
                    .unwrap_or(0),
            )
            .interact()?;

        VoiceFileConfig {
            enabled: Some(true),
            stt_backend: Some(backends[backend_idx].to_string()),
            model_size: Some(sizes[size_idx].to_string()),
            gender: Some(gender_labels[gender_idx].to_string()),
            tts_model: existing.voice.tts_model.clone(),
        }
    } else {
        VoiceFileConfig {
            enabled: Some(false),
            ..existing.voice.clone()
        }
    };

    let name = name.trim();
    let config = LingoConfigFile {
        name: (!name.is_empty()).then(|| name.to_string()),
        conversation: ConversationFileConfig {
            language: Some(language),
            level: Some(levels[level_idx].clone()),
            ..existing.conversation.clone()
        },
        voice,
        api_keys: ApiKeysFileConfig { openai: api_key },
        ..existing
    };

    crate::config::file::save_to(&config_path, &config)?;
    println!("\nSaved {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_ends() {
        assert_eq!(mask("sk-abcdefghijkl"), "sk-a...ijkl");
        assert_eq!(mask("short"), "****");
    }
}
