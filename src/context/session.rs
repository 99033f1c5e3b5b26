//! A single conversation session
//!
//! The session owns the rolling history. Each turn appends the user message,
//! retrieves memories relevant to the latest exchange, asks the model for a
//! reply, appends it, and archives the oldest block once the history is long
//! enough.

use std::sync::Arc;

use super::archive::{ArchiveConfig, Archiver, format_conversation};
use super::builder::{DEFAULT_ASSISTANT_NAME, PromptBuilder};
use super::Message;
use crate::Result;
use crate::db::{MemoryBackend, MemoryRecord, Retrieval};
use crate::llm::{ChatModel, GenerationParams};

/// Settings for a conversation session
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Name of the person practicing
    pub user_name: String,
    /// Name the assistant speaks as
    pub assistant_name: String,
    /// Grade label threaded into the instructions
    pub language_level: String,
    pub archive: ArchiveConfig,
    /// Sampling parameters for replies
    pub reply: GenerationParams,
}

impl ConversationConfig {
    #[must_use]
    pub fn new(user_name: impl Into<String>, language_level: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            language_level: language_level.into(),
            archive: ArchiveConfig::default(),
            reply: GenerationParams::conversation(100, 0.7),
        }
    }
}

/// Conversation state for one user
pub struct Conversation {
    config: ConversationConfig,
    history: Vec<Message>,
    chat: Arc<dyn ChatModel>,
    archiver: Archiver,
    prompt: PromptBuilder,
}

impl Conversation {
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        store: impl MemoryBackend + 'static,
        config: ConversationConfig,
    ) -> Self {
        let archiver = Archiver::new(
            Arc::clone(&chat),
            Arc::new(store),
            config.archive.summary_max_tokens,
        );
        let prompt = PromptBuilder::new(config.assistant_name.clone(), config.archive.archive_length);

        Self {
            config,
            history: Vec::new(),
            chat,
            archiver,
            prompt,
        }
    }

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub const fn config(&self) -> &ConversationConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn MemoryBackend {
        self.archiver.store()
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.history
            .push(Message::user(self.config.user_name.clone(), content));
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.history
            .push(Message::assistant(self.config.assistant_name.clone(), content));
    }

    /// Text used to look up memories for the next reply
    ///
    /// Past the archive length only the latest exchange is used; before that
    /// the whole history is.
    #[must_use]
    pub fn retrieval_query(&self) -> String {
        let len = self.history.len();
        let context = if len > self.config.archive.archive_length {
            &self.history[len.saturating_sub(2)..]
        } else {
            &self.history[..]
        };
        format_conversation(context)
    }

    /// Memories most similar to the current conversation
    ///
    /// An empty store yields no memories.
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the store query fails
    pub async fn retrieve_memories(&self) -> Result<Vec<MemoryRecord>> {
        let query = self.retrieval_query();
        match self
            .store()
            .query(&query, self.config.archive.memory_count)
            .await?
        {
            Retrieval::Found(records) => {
                for record in &records {
                    tracing::debug!(id = record.id, summary = %record.summary, "memory recalled");
                }
                Ok(records)
            }
            Retrieval::EmptyStore => {
                tracing::debug!("no memories yet");
                Ok(Vec::new())
            }
        }
    }

    /// Run one turn: record `text`, generate and record the reply
    ///
    /// A failed generation leaves the history exactly as it was before the
    /// call. A failed archive is logged and retried on the next turn.
    ///
    /// # Errors
    ///
    /// Returns error if memory retrieval or generation fails
    pub async fn respond(&mut self, text: &str) -> Result<String> {
        let checkpoint = self.history.len();
        self.append_user(text);

        let reply = match self.generate_reply().await {
            Ok(reply) => reply,
            Err(e) => {
                self.history.truncate(checkpoint);
                return Err(e);
            }
        };

        self.append_assistant(reply.clone());

        if let Err(e) = self.maybe_archive().await {
            tracing::warn!(error = %e, "archive failed, keeping history for next turn");
        }

        Ok(reply)
    }

    async fn generate_reply(&self) -> Result<String> {
        let memories = self.retrieve_memories().await?;
        let messages = self
            .prompt
            .build(&self.history, &memories, &self.config.language_level);

        tracing::debug!(
            history = self.history.len(),
            memories = memories.len(),
            "generating reply"
        );

        self.chat.generate(&messages, &self.config.reply).await
    }

    /// Archive the oldest block if the history reached twice the archive length
    ///
    /// Messages are evicted only after their summary has been stored.
    ///
    /// # Errors
    ///
    /// Returns error if summarization or the store write fails; the history
    /// is left untouched in that case
    pub async fn maybe_archive(&mut self) -> Result<Option<MemoryRecord>> {
        let archive_length = self.config.archive.archive_length;
        if !self.config.archive.needs_archive(self.history.len()) {
            return Ok(None);
        }

        let record = self
            .archiver
            .archive(
                &self.history[..archive_length],
                &self.config.user_name,
                &self.config.assistant_name,
            )
            .await?;
        self.history.drain(..archive_length);

        Ok(record)
    }

    /// Archive whatever remains of the history at the end of the session
    ///
    /// An empty history is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if summarization or the store write fails
    pub async fn finish(&mut self) -> Result<Option<MemoryRecord>> {
        if self.history.is_empty() {
            return Ok(None);
        }

        let record = self
            .archiver
            .archive(
                &self.history,
                &self.config.user_name,
                &self.config.assistant_name,
            )
            .await?;
        self.history.clear();

        tracing::info!(archived = record.is_some(), "conversation flushed");
        Ok(record)
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("config", &self.config)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}
