//! The interactive assistant loop
//!
//! Routes each line the user enters to a voice turn, a text turn or the end
//! of the session, and speaks replies when a speaker is attached.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::VoiceGender;
use crate::context::Conversation;
use crate::voice::{SAMPLE_RATE, SpeechToText, TextToSpeech, samples_to_wav};
use crate::{Error, Result};

/// Word that ends the session
pub const EXIT_COMMAND: &str = "goodbye";

/// Shown before a voice turn starts listening
pub const RECORDING_PROMPT: &str = "Recording... press Enter to stop.";

/// What a line of user input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Flush memory and exit
    Goodbye,
    /// Record and transcribe speech
    Voice,
    /// A typed message
    Text(String),
}

impl UserInput {
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Voice
        } else if trimmed.eq_ignore_ascii_case(EXIT_COMMAND) {
            Self::Goodbye
        } else {
            Self::Text(trimmed.to_string())
        }
    }
}

/// Result of a single turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied(String),
    /// Speech came back empty; nothing was sent to the model
    NothingHeard,
    /// The session ended
    Finished,
}

/// Source of spoken user input
#[async_trait]
pub trait Listener: Send + Sync {
    /// Record one utterance and transcribe it; `None` when nothing was said
    async fn listen(&self) -> Result<Option<String>>;
}

/// Sink for spoken replies
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn say(&self, text: &str) -> Result<()>;
}

/// Listens on the microphone until Enter is pressed
pub struct MicrophoneListener {
    stt: Arc<SpeechToText>,
}

impl MicrophoneListener {
    #[must_use]
    pub const fn new(stt: Arc<SpeechToText>) -> Self {
        Self { stt }
    }
}

#[async_trait]
impl Listener for MicrophoneListener {
    async fn listen(&self) -> Result<Option<String>> {
        let samples = record().await?;
        if samples.is_empty() {
            return Ok(None);
        }
        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }
}

#[cfg(feature = "audio")]
async fn record() -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(crate::voice::record_until_enter)
        .await
        .map_err(|e| Error::Audio(format!("recording task failed: {e}")))?
}

#[cfg(not(feature = "audio"))]
#[allow(clippy::unused_async)]
async fn record() -> Result<Vec<f32>> {
    Err(Error::Audio(
        "microphone support not built; rebuild with --features audio".to_string(),
    ))
}

/// Synthesizes replies and plays them on the default output device
pub struct TtsSpeaker {
    tts: TextToSpeech,
    language: String,
    gender: VoiceGender,
}

impl TtsSpeaker {
    /// Create a speaker, checking that a voice exists for the combination
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unsupported language
    pub fn new(tts: TextToSpeech, language: impl Into<String>, gender: VoiceGender) -> Result<Self> {
        let language = language.into();
        crate::voice::voice_for(&language, gender)?;
        Ok(Self {
            tts,
            language,
            gender,
        })
    }
}

#[async_trait]
impl Speaker for TtsSpeaker {
    async fn say(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text, &self.language, self.gender).await?;
        play(audio).await
    }
}

#[cfg(feature = "audio")]
async fn play(audio: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || crate::voice::play_mp3(&audio))
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}

#[cfg(not(feature = "audio"))]
#[allow(clippy::unused_async)]
async fn play(audio: Vec<u8>) -> Result<()> {
    tracing::debug!(bytes = audio.len(), "audio playback not built, skipping");
    Ok(())
}

/// A conversation plus its optional voice input and output
pub struct Assistant {
    conversation: Conversation,
    listener: Option<Box<dyn Listener>>,
    speaker: Option<Box<dyn Speaker>>,
}

impl Assistant {
    #[must_use]
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            listener: None,
            speaker: None,
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Box<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    #[must_use]
    pub fn with_speaker(mut self, speaker: Box<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Handle one line of input, writing the dialogue to `out`
    ///
    /// # Errors
    ///
    /// Returns error if listening, generation or the final flush fails. The
    /// conversation stays usable after an error.
    pub async fn turn<W: Write + Send>(&mut self, input: UserInput, out: &mut W) -> Result<TurnOutcome> {
        match input {
            UserInput::Goodbye => {
                self.shutdown().await?;
                Ok(TurnOutcome::Finished)
            }
            UserInput::Voice => {
                let listener = self.listener.as_deref().ok_or_else(|| {
                    Error::Config("voice input is disabled; type a message".to_string())
                })?;
                writeln!(out, "{RECORDING_PROMPT}")?;
                out.flush()?;

                let Some(transcript) = listener.listen().await? else {
                    tracing::warn!("transcript is empty, skipping turn");
                    writeln!(out, "I didn't catch that.")?;
                    return Ok(TurnOutcome::NothingHeard);
                };
                writeln!(out, "ME: {transcript}\n")?;
                self.reply(&transcript, out).await
            }
            UserInput::Text(text) => self.reply(&text, out).await,
        }
    }

    async fn reply<W: Write + Send>(&mut self, text: &str, out: &mut W) -> Result<TurnOutcome> {
        let reply = self.conversation.respond(text).await?;
        writeln!(out, "\nLINGO: {reply}\n\n----------------------------------------\n")?;
        out.flush()?;
        self.speak(&reply).await;
        Ok(TurnOutcome::Replied(reply))
    }

    /// Speak `text` if a speaker is attached; failures are logged
    pub async fn speak(&self, text: &str) {
        if let Some(speaker) = &self.speaker
            && let Err(e) = speaker.say(text).await
        {
            tracing::warn!(error = %e, "failed to speak reply");
        }
    }

    /// Archive what is left of the conversation
    ///
    /// # Errors
    ///
    /// Returns error if the final summary cannot be stored
    pub async fn shutdown(&mut self) -> Result<()> {
        let record = self.conversation.finish().await?;
        tracing::info!(memory = ?record.map(|r| r.id), "session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_goodbye_any_case() {
        assert_eq!(UserInput::classify("goodbye"), UserInput::Goodbye);
        assert_eq!(UserInput::classify("  GoodBye \n"), UserInput::Goodbye);
    }

    #[test]
    fn classify_empty_is_voice() {
        assert_eq!(UserInput::classify(""), UserInput::Voice);
        assert_eq!(UserInput::classify("   \n"), UserInput::Voice);
    }

    #[test]
    fn classify_text() {
        assert_eq!(
            UserInput::classify(" goodbye friend "),
            UserInput::Text("goodbye friend".to_string())
        );
    }
}
