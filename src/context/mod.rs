//! Conversation context and memory policy
//!
//! - Messages (tagged per role)
//! - Prompt composition (instructions, memories, recent history)
//! - Archival of old turns into long-term memory
//! - The session that ties them together

pub mod archive;
mod builder;
mod message;
mod session;

pub use archive::{ArchiveConfig, Archiver, format_conversation};
pub use builder::{DEFAULT_ASSISTANT_NAME, PromptBuilder, system_prompt};
pub use message::{MEMORY_SPEAKER, Message, Role};
pub use session::{Conversation, ConversationConfig};
