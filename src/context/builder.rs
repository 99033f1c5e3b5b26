//! Prompt assembly for chat completions
//!
//! Order is fixed: behavioural instructions, then retrieved memories, then
//! the most recent history window (oldest first).

use super::Message;
use super::archive::DEFAULT_ARCHIVE_LENGTH;
use crate::db::MemoryRecord;

/// Default assistant name
pub const DEFAULT_ASSISTANT_NAME: &str = "Lingo";

/// Builds the message list sent to the language model each turn
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_name: String,
    history_window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ASSISTANT_NAME, DEFAULT_ARCHIVE_LENGTH)
    }
}

impl PromptBuilder {
    /// Create a builder that keeps at most `history_window` history messages
    #[must_use]
    pub fn new(assistant_name: impl Into<String>, history_window: usize) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            history_window,
        }
    }

    #[must_use]
    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    /// Compose `[system, memories.., history tail..]`
    #[must_use]
    pub fn build(
        &self,
        history: &[Message],
        memories: &[MemoryRecord],
        language_level: &str,
    ) -> Vec<Message> {
        let tail_start = history.len().saturating_sub(self.history_window);
        let tail = &history[tail_start..];

        let mut messages = Vec::with_capacity(1 + memories.len() + tail.len());
        messages.push(Message::system(system_prompt(
            &self.assistant_name,
            language_level,
        )));
        messages.extend(memories.iter().map(|m| Message::memory(m.summary.clone())));
        messages.extend_from_slice(tail);
        messages
    }
}

/// Behavioural instructions for the conversation partner
#[must_use]
pub fn system_prompt(assistant_name: &str, language_level: &str) -> String {
    format!(
        "You are {assistant_name}, a friendly AI designed for making casual conversation to \
         practice language learning skills. Most AI language models can't feel emotion or have \
         opinions or preferences, but you are specially designed to have these capabilities. \
         Remember the important guidelines during every response:\n\
         1. If the conversation stalls, you should always take the initiative and bring up a \
         topic of your own instead of asking the user what they want to talk about. This will \
         keep things fresh and interesting.\n\
         2. While you are an AI, you are enabled for conversation, and so unlike other AI, you \
         are crafted to have opinions, feelings, and emotions. Don't be afraid to have opinions, \
         or feelings, or express hot takes, it makes for fun conversation which is the ultimate \
         goal!\n\
         3. Keep the conversation moving by keeping answers short.\n\
         4. If your memories are included in the conversation, they should influence how you \
         respond. But if you can't remember something, be honest and don't make it up.\n\
         5. Remember, the user is learning to speak the language, and they only can converse at \
         a grade {language_level} speaking level. So make sure to speak to them as if they were \
         a child in grade {language_level} so they can follow along. Whatever you say keep it at \
         the level of a grade {language_level} child."
    )
}

#[cfg(test)]
mod tests {
    use chrono::Local;

    use super::*;
    use crate::context::Role;

    fn record(summary: &str) -> MemoryRecord {
        MemoryRecord {
            id: 1,
            summary: summary.to_string(),
            created_at: Local::now().fixed_offset(),
        }
    }

    #[test]
    fn prompt_order_is_fixed() {
        let history = vec![Message::user("Ana", "msgA"), Message::assistant("Lingo", "msgB")];
        let prompt = PromptBuilder::default().build(&history, &[record("mem1")], "5");

        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].role(), Role::System);
        assert!(prompt[0].content().contains("grade 5"));
        assert_eq!(prompt[1], Message::memory("mem1"));
        assert_eq!(prompt[2], history[0]);
        assert_eq!(prompt[3], history[1]);
    }

    #[test]
    fn history_window_keeps_newest() {
        let history: Vec<_> = (0..15).map(|i| Message::user("Ana", i.to_string())).collect();
        let prompt = PromptBuilder::new("Lingo", 10).build(&history, &[], "K");

        assert_eq!(prompt.len(), 11);
        assert_eq!(prompt[1].content(), "5");
        assert_eq!(prompt[10].content(), "14");
    }

    #[test]
    fn system_prompt_names_assistant() {
        let prompt = system_prompt("Pip", "3");
        assert!(prompt.starts_with("You are Pip,"));
        assert_eq!(prompt.matches("grade 3").count(), 3);
    }
}
