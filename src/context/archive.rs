//! Archival of old conversation turns into long-term memory
//!
//! Once the history reaches twice the archive length, the oldest block is
//! summarized by the language model in the assistant's own voice and written
//! to the memory store as a timestamped record.

use std::sync::Arc;

use chrono::Local;

use super::Message;
use crate::Result;
use crate::db::{MemoryBackend, MemoryRecord};
use crate::llm::{ChatModel, GenerationParams};

/// Default number of messages evicted per archive
pub const DEFAULT_ARCHIVE_LENGTH: usize = 10;

/// Default number of memories retrieved per turn
pub const DEFAULT_MEMORY_COUNT: usize = 4;

/// Default token budget for an archive summary
pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 100;

/// Thresholds for history eviction and memory retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Messages evicted per archive; also the history window sent to the model
    pub archive_length: usize,
    /// Memories requested per turn
    pub memory_count: usize,
    /// Token cap for the generated summary
    pub summary_max_tokens: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_length: DEFAULT_ARCHIVE_LENGTH,
            memory_count: DEFAULT_MEMORY_COUNT,
            summary_max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
        }
    }
}

impl ArchiveConfig {
    /// Whether a history of `len` messages should be archived
    #[must_use]
    pub const fn needs_archive(&self, len: usize) -> bool {
        self.archive_length > 0 && len >= self.archive_length * 2
    }
}

/// Render messages as `speaker: content` lines
///
/// The whole transcript is trimmed, so formatting an already formatted
/// single line again yields the same text.
#[must_use]
pub fn format_conversation(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str(msg.transcript_label());
        out.push_str(": ");
        out.push_str(msg.content());
        out.push('\n');
    }
    out.trim().to_string()
}

/// Instruction asking the model to summarize a transcript as a note to itself
#[must_use]
pub fn summarization_prompt(assistant_name: &str, transcript: &str) -> String {
    format!(
        "you are {assistant_name}, an AI designed to summarize conversations you've previously had, \
         and provide synopsis of what was discussed so you can remember them later. Think of this \
         as writing a note to yourself so you remember what you talked about. All summaries should \
         be in the first person. Condense the summaries as small as possible, but write down \
         anything that seems like it would be important to remember later, especially notes about \
         the user. Please summarize the following conversation you just had:\n\n{transcript}"
    )
}

/// Summarizes message blocks and writes them to the memory store
pub struct Archiver {
    chat: Arc<dyn ChatModel>,
    store: Arc<dyn MemoryBackend>,
    summary_max_tokens: u32,
}

impl Archiver {
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn MemoryBackend>,
        summary_max_tokens: u32,
    ) -> Self {
        Self {
            chat,
            store,
            summary_max_tokens,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn MemoryBackend {
        self.store.as_ref()
    }

    /// Summarize `block` and store it as one memory
    ///
    /// `requester` is the speaker the summarization request is sent as.
    /// Returns `None` without contacting the model when `block` is empty.
    ///
    /// Once the record is written the block counts as archived: a failed
    /// checkpoint is only logged, and the next archive checkpoints again.
    ///
    /// # Errors
    ///
    /// Returns error if summarization, embedding or the store write fails
    pub async fn archive(
        &self,
        block: &[Message],
        requester: &str,
        assistant_name: &str,
    ) -> Result<Option<MemoryRecord>> {
        let transcript = format_conversation(block);
        if transcript.is_empty() {
            tracing::debug!("nothing to archive");
            return Ok(None);
        }

        let request = [Message::user(
            requester,
            summarization_prompt(assistant_name, &transcript),
        )];
        let params = GenerationParams::summary(self.summary_max_tokens);
        let summary = self.chat.generate(&request, &params).await?;

        let record = self.store.add(&summary, Local::now().fixed_offset()).await?;
        if let Err(e) = self.store.persist() {
            tracing::warn!(id = record.id, error = %e, "memory written but not checkpointed");
        }

        tracing::info!(
            id = record.id,
            messages = block.len(),
            "archived conversation segment"
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uses_speaker_labels() {
        let messages = vec![
            Message::user("Ana", "I like cats  "),
            Message::assistant("Lingo", "Me too!"),
        ];
        assert_eq!(
            format_conversation(&messages),
            "Ana: I like cats  \nLingo: Me too!"
        );
    }

    #[test]
    fn format_empty_is_empty() {
        assert_eq!(format_conversation(&[]), "");
    }

    #[test]
    fn format_is_trim_idempotent() {
        let once = format_conversation(&[Message::user("Ana", "  hello there  ")]);
        let again = format_conversation(&[Message::system(once.clone())]);
        assert_eq!(once, "Ana:   hello there");
        assert_eq!(again, format!("system: {once}"));
        assert_eq!(again.trim(), again);
    }

    #[test]
    fn needs_archive_at_double_length() {
        let config = ArchiveConfig::default();
        assert!(!config.needs_archive(19));
        assert!(config.needs_archive(20));
        assert!(config.needs_archive(21));

        let disabled = ArchiveConfig {
            archive_length: 0,
            ..ArchiveConfig::default()
        };
        assert!(!disabled.needs_archive(100));
    }

    #[test]
    fn prompt_embeds_transcript_and_name() {
        let prompt = summarization_prompt("Lingo", "Ana: hi");
        assert!(prompt.starts_with("you are Lingo,"));
        assert!(prompt.contains("first person"));
        assert!(prompt.ends_with("\n\nAna: hi"));
    }
}
