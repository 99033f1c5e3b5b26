//! Speech-to-text (STT) processing
//!
//! A transcript that comes back blank is reported as `None`: the caller
//! skips the turn instead of treating it as a failure.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::config::ModelSize;
use crate::{Error, Result};

/// Model used by the transcription API
pub const API_STT_MODEL: &str = "whisper-1";

/// Name of the local Whisper executable
pub const WHISPER_BINARY: &str = "whisper";

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// STT provider backend
#[derive(Debug)]
enum SttProvider {
    /// Whisper CLI on this machine
    Local { binary: PathBuf, model: ModelSize },
    /// `OpenAI` transcription endpoint
    Api {
        client: reqwest::Client,
        api_key: SecretString,
        base_url: String,
    },
}

/// Transcribes speech to text
#[derive(Debug)]
pub struct SpeechToText {
    provider: SttProvider,
    language: String,
}

impl SpeechToText {
    /// Use the Whisper CLI found on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if `whisper` is not installed
    pub fn new_local(model: ModelSize, language: impl Into<String>) -> Result<Self> {
        let binary = which::which(WHISPER_BINARY).map_err(|e| {
            Error::Config(format!(
                "local transcription needs the `{WHISPER_BINARY}` command on PATH ({e}); \
                 install openai-whisper or set stt_backend = \"api\""
            ))
        })?;
        Ok(Self::with_binary(binary, model, language))
    }

    /// Use a specific Whisper-compatible executable
    #[must_use]
    pub fn with_binary(binary: PathBuf, model: ModelSize, language: impl Into<String>) -> Self {
        Self {
            provider: SttProvider::Local { binary, model },
            language: language.into(),
        }
    }

    /// Use the `OpenAI` transcription API
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new_api(api_key: SecretString, language: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            provider: SttProvider::Api {
                client: reqwest::Client::new(),
                api_key,
                base_url: crate::llm::DEFAULT_BASE_URL.to_string(),
            },
            language: language.into(),
        })
    }

    /// Transcribe WAV audio
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    pub async fn transcribe(&self, wav: &[u8]) -> Result<Option<String>> {
        let raw = match &self.provider {
            SttProvider::Local { binary, model } => {
                self.transcribe_local(binary, *model, wav).await?
            }
            SttProvider::Api {
                client,
                api_key,
                base_url,
            } => self.transcribe_api(client, api_key, base_url, wav).await?,
        };

        let transcript = clean_transcript(&raw);
        match &transcript {
            Some(text) => tracing::info!(transcript = %text, "transcription complete"),
            None => tracing::info!("transcription was empty"),
        }
        Ok(transcript)
    }

    /// Transcribe using the Whisper CLI
    async fn transcribe_local(&self, binary: &Path, model: ModelSize, wav: &[u8]) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let audio_path = dir.path().join("speech.wav");
        tokio::fs::write(&audio_path, wav).await?;

        tracing::debug!(
            binary = %binary.display(),
            model = %model,
            language = %self.language,
            audio_bytes = wav.len(),
            "starting local Whisper transcription"
        );

        let output = tokio::process::Command::new(binary)
            .arg(&audio_path)
            .args(["--model", model.as_str()])
            .args(["--language", self.language.as_str()])
            .args(["--output_format", "txt"])
            .arg("--output_dir")
            .arg(dir.path())
            .args(["--fp16", "False"])
            .output()
            .await
            .map_err(|e| Error::Stt(format!("failed to run {}: {e}", binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(code = ?output.status.code(), "whisper exited with error");
            return Err(Error::Stt(format!(
                "whisper exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let transcript_path = dir.path().join("speech.txt");
        match tokio::fs::read_to_string(&transcript_path).await {
            Ok(text) => Ok(text),
            // Some builds only print to stdout
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_api(
        &self,
        client: &reqwest::Client,
        api_key: &SecretString,
        base_url: &str,
        wav: &[u8],
    ) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper API transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", API_STT_MODEL)
            .text("language", self.language.clone());

        let response = client
            .post(format!("{base_url}/audio/transcriptions"))
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }
}

/// Collapse Whisper output to a single trimmed line, `None` when blank
#[must_use]
pub fn clean_transcript(raw: &str) -> Option<String> {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
