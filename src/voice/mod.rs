//! Voice processing module
//!
//! Speech-to-text and text-to-speech adapters, plus microphone capture and
//! speaker playback when built with the `audio` feature.

#[cfg(feature = "audio")]
mod capture;
#[cfg(feature = "audio")]
mod playback;
mod stt;
mod tts;
mod wav;

#[cfg(feature = "audio")]
pub use capture::{AudioCapture, record_for, record_until_enter};
#[cfg(feature = "audio")]
pub use playback::{DecodedAudio, decode_mp3, play_mp3};
pub use stt::{API_STT_MODEL, SpeechToText, WHISPER_BINARY, clean_transcript};
pub use tts::{DEFAULT_TTS_MODEL, TextToSpeech, supported_languages, voice_for};
pub use wav::{SAMPLE_RATE, duration_secs, samples_to_wav};

/// Whether this build can use the microphone and speakers
pub const AUDIO_ENABLED: bool = cfg!(feature = "audio");
