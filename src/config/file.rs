//! TOML configuration file loading
//!
//! Supports `~/.config/lingo/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct LingoConfigFile {
    /// Name of the person practicing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Where the memory store lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    #[serde(default)]
    pub conversation: ConversationFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Conversation and memory settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConversationFileConfig {
    /// Conversation language code (e.g. "en")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Grade label ("K", "1" through "12")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_max_tokens: Option<u32>,
}

/// Language model settings
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Voice input/output settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// "local" (whisper CLI) or "api"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stt_backend: Option<String>,

    /// Whisper model tier for the local backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_size: Option<String>,

    /// "male" or "female"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// TTS model (e.g. "tts-1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiKeysFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LingoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LingoConfigFile {
    let Some(path) = config_file_path() else {
        return LingoConfigFile::default();
    };

    if !path.exists() {
        return LingoConfigFile::default();
    }

    match load_from(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            LingoConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_from(path: &Path) -> Result<LingoConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn save_to(path: &Path, config: &LingoConfigFile) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;

    tracing::info!(path = %path.display(), "wrote config file");
    Ok(())
}

/// Return the config file path: `~/.config/lingo/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lingo").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config: LingoConfigFile = toml::from_str("").unwrap();
        assert_eq!(config, LingoConfigFile::default());
    }

    #[test]
    fn partial_sections_parse() {
        let config: LingoConfigFile = toml::from_str(
            r#"
            name = "Ana"

            [conversation]
            language = "en"
            level = "5"

            [voice]
            gender = "female"
            "#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("Ana"));
        assert_eq!(config.conversation.level.as_deref(), Some("5"));
        assert_eq!(config.voice.gender.as_deref(), Some("female"));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = LingoConfigFile {
            name: Some("Ana".to_string()),
            voice: VoiceFileConfig {
                model_size: Some("base".to_string()),
                ..VoiceFileConfig::default()
            },
            ..LingoConfigFile::default()
        };

        save_to(&path, &config).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }
}
