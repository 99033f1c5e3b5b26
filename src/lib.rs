//! Lingo - a voice and text conversation partner for language practice
//!
//! This library provides the core of the assistant:
//! - Conversation sessions with a rolling history
//! - Archival of old turns into summarized long-term memories
//! - Similarity retrieval of memories into each prompt
//! - Speech-to-text and text-to-speech adapters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Assistant                        │
//! │     typed input  │  voice (STT)  │  replies (TTS)    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Conversation                       │
//! │   history  │  prompt builder  │  archiver            │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐       ┌──────────▼────────────┐
//! │  Chat model (LLM)   │       │  Memory store          │
//! │                     │       │  SQLite + sqlite-vec   │
//! └─────────────────────┘       └────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod llm;
pub mod setup;
pub mod voice;

pub use assistant::{Assistant, Listener, Speaker, TurnOutcome, UserInput};
pub use config::Config;
pub use context::{Conversation, ConversationConfig, Message};
pub use db::{DbPool, MemoryBackend, MemoryRecord, MemoryStore, Retrieval};
pub use error::{Error, Result};
pub use llm::{ChatModel, GenerationParams, LlmError};
