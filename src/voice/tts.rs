//! Text-to-speech (TTS) processing

use secrecy::{ExposeSecret, SecretString};

use crate::config::VoiceGender;
use crate::{Error, Result};

/// Default TTS model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Voices per (language, gender)
const VOICES: &[(&str, VoiceGender, &str)] = &[
    ("en", VoiceGender::Male, "onyx"),
    ("en", VoiceGender::Female, "nova"),
    ("es", VoiceGender::Male, "echo"),
    ("es", VoiceGender::Female, "shimmer"),
    ("fr", VoiceGender::Male, "echo"),
    ("fr", VoiceGender::Female, "shimmer"),
    ("de", VoiceGender::Male, "onyx"),
    ("de", VoiceGender::Female, "nova"),
    ("it", VoiceGender::Male, "echo"),
    ("it", VoiceGender::Female, "nova"),
    ("pt", VoiceGender::Male, "onyx"),
    ("pt", VoiceGender::Female, "shimmer"),
];

/// Language codes with a configured voice
pub fn supported_languages() -> impl Iterator<Item = &'static str> {
    VOICES
        .iter()
        .map(|(lang, _, _)| *lang)
        .enumerate()
        .filter(|(i, lang)| VOICES[..*i].iter().all(|(l, _, _)| l != lang))
        .map(|(_, lang)| lang)
}

/// Look up the voice for a language and gender
///
/// # Errors
///
/// Returns a configuration error if no voice exists for the language
pub fn voice_for(language: &str, gender: VoiceGender) -> Result<&'static str> {
    let language = language.trim().to_ascii_lowercase();
    VOICES
        .iter()
        .find(|(lang, g, _)| *lang == language && *g == gender)
        .map(|(_, _, voice)| *voice)
        .ok_or_else(|| {
            Error::Config(format!(
                "audio voice language code '{language}' not implemented (supported: {})",
                supported_languages().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Synthesizes speech from text
#[derive(Debug)]
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: crate::llm::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different compatible endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize text to speech
    ///
    /// The voice is resolved before any request is made.
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unsupported language, or an
    /// error if synthesis fails
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        gender: VoiceGender,
    ) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let voice = voice_for(language, gender)?;
        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: "mp3",
        };

        tracing::debug!(voice, chars = text.len(), "synthesizing speech");

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
