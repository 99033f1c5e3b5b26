//! Configuration management for Lingo
//!
//! Values resolve as CLI flag > environment > config file > default.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::context::{ArchiveConfig, ConversationConfig};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, GenerationParams};
use crate::{Error, Result};

pub use file::LingoConfigFile;

/// Whisper model tier for local transcription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelSize {
    #[default]
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub const ALL: [Self; 5] = [
        Self::Tiny,
        Self::Base,
        Self::Small,
        Self::Medium,
        Self::Large,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown model size '{s}' (expected tiny, base, small, medium or large)"
                ))
            })
    }
}

/// Voice gender used to pick a speech synthesis voice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoiceGender {
    Male,
    #[default]
    Female,
}

impl VoiceGender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceGender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            _ => Err(Error::Config(format!(
                "voice gender must be male ('M') or female ('F'), got '{s}'"
            ))),
        }
    }
}

/// Target proficiency as a school grade: kindergarten or grades 1 to 12
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LanguageLevel(u8);

impl LanguageLevel {
    pub const KINDERGARTEN: Self = Self(0);
    pub const MAX_GRADE: u8 = 12;

    /// Grade `1..=12`
    #[must_use]
    pub const fn grade(grade: u8) -> Option<Self> {
        if matches!(grade, 1..=Self::MAX_GRADE) {
            Some(Self(grade))
        } else {
            None
        }
    }

    /// Every valid level, lowest first
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=Self::MAX_GRADE).map(Self)
    }

    /// Label threaded into the instructions (`K`, `1` .. `12`)
    #[must_use]
    pub fn label(self) -> String {
        if self.0 == 0 {
            "K".to_string()
        } else {
            self.0.to_string()
        }
    }
}

impl Default for LanguageLevel {
    fn default() -> Self {
        Self(5)
    }
}

impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for LanguageLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("k") {
            return Ok(Self::KINDERGARTEN);
        }
        trimmed
            .parse::<u8>()
            .ok()
            .and_then(Self::grade)
            .ok_or_else(|| {
                Error::Config(format!("language level must be K or 1 to 12, got '{s}'"))
            })
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SttBackend {
    /// Whisper CLI on this machine
    #[default]
    Local,
    /// `OpenAI` transcription endpoint
    Api,
}

impl SttBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for SttBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "api" | "openai" => Ok(Self::Api),
            _ => Err(Error::Config(format!(
                "stt backend must be 'local' or 'api', got '{s}'"
            ))),
        }
    }
}

/// Validate and normalize a language code (`en`, `es`, `fra`)
///
/// # Errors
///
/// Returns error if the code is not 2 or 3 ASCII letters
pub fn parse_language(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_lowercase();
    if (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(Error::Config(format!(
            "language must be a 2 or 3 letter code, got '{code}'"
        )))
    }
}

/// Lingo configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the person practicing; asked for at startup when unset
    pub user_name: Option<String>,

    /// Conversation language code
    pub language: String,

    /// Target proficiency
    pub level: LanguageLevel,

    /// Path to data directory (memory store)
    pub data_dir: PathBuf,

    /// History and memory thresholds
    pub archive: ArchiveConfig,

    pub llm: LlmConfig,

    pub voice: VoiceConfig,

    pub api_keys: ApiKeys,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Token cap for conversational replies
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input and spoken replies
    pub enabled: bool,
    pub stt_backend: SttBackend,
    pub model_size: ModelSize,
    pub gender: VoiceGender,
    /// TTS model (e.g. "tts-1")
    pub tts_model: String,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat, embeddings, Whisper API and TTS)
    pub openai: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub language: Option<String>,
    pub level: Option<String>,
    pub model_size: Option<String>,
    pub gender: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub disable_voice: bool,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if any value is outside its valid set
    pub fn load(overrides: Overrides) -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok(), overrides)
    }

    /// Combine overrides, environment lookups and file values
    ///
    /// # Errors
    ///
    /// Returns error if any value is outside its valid set
    pub fn resolve(
        fc: LingoConfigFile,
        env: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self> {
        let user_name = overrides
            .name
            .or_else(|| env("LINGO_NAME"))
            .or(fc.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let language = overrides
            .language
            .or_else(|| env("LINGO_LANGUAGE"))
            .or(fc.conversation.language)
            .map_or_else(|| Ok("en".to_string()), |l| parse_language(&l))?;

        let level = overrides
            .level
            .or_else(|| env("LINGO_LEVEL"))
            .or(fc.conversation.level)
            .map_or_else(|| Ok(LanguageLevel::default()), |l| l.parse())?;

        let defaults = ArchiveConfig::default();
        let archive = ArchiveConfig {
            archive_length: fc
                .conversation
                .archive_length
                .unwrap_or(defaults.archive_length),
            memory_count: fc
                .conversation
                .memory_count
                .unwrap_or(defaults.memory_count),
            summary_max_tokens: fc
                .conversation
                .summary_max_tokens
                .unwrap_or(defaults.summary_max_tokens),
        };
        if archive.archive_length < 2 {
            return Err(Error::Config(
                "archive_length must be at least 2".to_string(),
            ));
        }

        let llm = LlmConfig {
            model: env("LINGO_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            base_url: env("LINGO_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: fc.llm.max_tokens.unwrap_or(100),
            temperature: fc.llm.temperature.unwrap_or(0.7),
        };

        let voice = VoiceConfig {
            enabled: !overrides.disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_backend: env("LINGO_STT_BACKEND")
                .or(fc.voice.stt_backend)
                .map_or_else(|| Ok(SttBackend::default()), |b| b.parse())?,
            model_size: overrides
                .model_size
                .or_else(|| env("LINGO_MODEL_SIZE"))
                .or(fc.voice.model_size)
                .map_or_else(|| Ok(ModelSize::default()), |m| m.parse())?,
            gender: overrides
                .gender
                .or_else(|| env("LINGO_VOICE_GENDER"))
                .or(fc.voice.gender)
                .map_or_else(|| Ok(VoiceGender::default()), |g| g.parse())?,
            tts_model: env("LINGO_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
        };

        if overrides.disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or_else(|| env("LINGO_API_KEY"))
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty()),
        };

        // Data directory (~/.local/share/lingo on Linux)
        let data_dir = overrides
            .data_dir
            .or_else(|| env("LINGO_DATA_DIR").map(PathBuf::from))
            .or_else(|| fc.data_dir.map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            user_name,
            language,
            level,
            data_dir,
            archive,
            llm,
            voice,
            api_keys,
        })
    }

    /// Directory holding the memory store
    #[must_use]
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }

    /// The `OpenAI` key, wrapped for use by clients
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn openai_key(&self) -> Result<SecretString> {
        self.api_keys
            .openai
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| {
                Error::Config(
                    "OpenAI API key not set (OPENAI_API_KEY, LINGO_API_KEY or lingo setup)"
                        .to_string(),
                )
            })
    }

    /// Session settings for `user_name`
    #[must_use]
    pub fn conversation(&self, user_name: &str) -> ConversationConfig {
        let mut config = ConversationConfig::new(user_name, self.level.label());
        config.archive = self.archive;
        config.reply = GenerationParams::conversation(self.llm.max_tokens, self.llm.temperature);
        config
    }
}

/// Default data directory: `~/.local/share/lingo`
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from(".lingo"), |d| d.data_dir().join("lingo"))
}
