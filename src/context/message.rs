//! Conversation messages

use serde::{Deserialize, Serialize};

/// Speaker name attached to injected memories
pub const MEMORY_SPEAKER: &str = "Lingo_memory";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Assistant,
    System,
    /// System-level message carrying a retrieved memory
    SystemMemory,
}

impl Role {
    /// Role name understood by chat-completion APIs
    ///
    /// Memories travel as system messages; the speaker name tells them apart.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System | Self::SystemMemory => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::SystemMemory => "system-memory",
        };
        f.write_str(s)
    }
}

/// A single conversation message
///
/// Each variant carries only the fields its role needs: system instructions
/// have no speaker, user and assistant turns always do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Behavioural instructions
    System { content: String },
    /// A retrieved memory summary
    Memory { content: String },
    /// A user turn
    User { name: String, content: String },
    /// An assistant turn
    Assistant { name: String, content: String },
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn memory(content: impl Into<String>) -> Self {
        Self::Memory {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::User {
            name: name.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Assistant {
            name: name.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::Memory { .. } => Role::SystemMemory,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
        }
    }

    /// Speaker name, if the role has one
    #[must_use]
    pub fn speaker(&self) -> Option<&str> {
        match self {
            Self::System { .. } => None,
            Self::Memory { .. } => Some(MEMORY_SPEAKER),
            Self::User { name, .. } | Self::Assistant { name, .. } => Some(name),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Memory { content }
            | Self::User { content, .. }
            | Self::Assistant { content, .. } => content,
        }
    }

    /// Label used when rendering the message into a transcript line
    #[must_use]
    pub fn transcript_label(&self) -> &str {
        self.speaker().unwrap_or("system")
    }
}
