//! Conversation memory integration tests
//!
//! Runs whole sessions against a scripted model and an in-memory store

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use lingo::context::{ConversationConfig, MEMORY_SPEAKER, Role};
use lingo::{
    Conversation, Error, MemoryBackend, MemoryRecord, MemoryStore, Message, Result, Retrieval,
};

mod common;

use common::{ScriptedChat, conversation, memory_store, run_turns};

/// Store that writes normally but can never checkpoint
struct UncheckpointedStore(MemoryStore);

#[async_trait]
impl MemoryBackend for UncheckpointedStore {
    async fn add(&self, summary: &str, created_at: DateTime<FixedOffset>) -> Result<MemoryRecord> {
        self.0.add(summary, created_at).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<Retrieval> {
        self.0.query(text, k).await
    }

    fn count(&self) -> Result<usize> {
        self.0.count()
    }

    fn persist(&self) -> Result<()> {
        Err(Error::Database("disk I/O error".to_string()))
    }
}

#[tokio::test]
async fn history_grows_until_double_archive_length() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    run_turns(&mut convo, 1, 9).await;

    assert_eq!(convo.history().len(), 18);
    assert_eq!(convo.store().count().unwrap(), 0);
    assert!(chat.summary_requests().is_empty());
}

#[tokio::test]
async fn archive_evicts_oldest_block_in_order() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    run_turns(&mut convo, 1, 9).await;
    let before: Vec<Message> = convo.history().to_vec();
    run_turns(&mut convo, 10, 1).await;

    let history = convo.history();
    assert_eq!(history.len(), 10);
    assert_eq!(convo.store().count().unwrap(), 1);

    // The remainder is the newest ten messages, in original order
    assert_eq!(&history[..8], &before[10..]);
    assert_eq!(history[8], Message::user("Ana", "message 10"));
    assert_eq!(history[9].role(), Role::Assistant);

    // The summary covered exactly the evicted block
    let summaries = chat.summary_requests();
    assert_eq!(summaries.len(), 1);
    let prompt = summaries[0].messages[0].content();
    assert!(prompt.contains("Ana: message 1\nLingo: reply 1"));
    assert!(prompt.ends_with("Ana: message 5\nLingo: reply 5"));
    assert!(!prompt.contains("message 6"));
    assert_eq!(summaries[0].params.max_tokens, 100);
}

#[tokio::test]
async fn archives_again_after_another_block() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    run_turns(&mut convo, 1, 15).await;

    assert_eq!(convo.history().len(), 10);
    assert_eq!(convo.store().count().unwrap(), 2);
    assert_eq!(convo.history()[0], Message::user("Ana", "message 11"));
}

#[tokio::test]
async fn retrieval_query_uses_latest_exchange_past_threshold() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat, memory_store());

    run_turns(&mut convo, 1, 2).await;
    assert_eq!(
        convo.retrieval_query(),
        "Ana: message 1\nLingo: reply 1\nAna: message 2\nLingo: reply 2"
    );

    run_turns(&mut convo, 3, 4).await;
    assert_eq!(convo.history().len(), 12);
    assert_eq!(convo.retrieval_query(), "Ana: message 6\nLingo: reply 6");
}

#[tokio::test]
async fn prompt_carries_instructions_memories_then_history() {
    let chat = ScriptedChat::new();
    let store = memory_store();
    store.add_now("I learned Ana loves pizza").await.unwrap();
    let mut convo = conversation(chat.clone(), store);

    convo.respond("Do you like pizza?").await.unwrap();

    let requests = chat.reply_requests();
    assert_eq!(requests.len(), 1);
    let messages = &requests[0].messages;

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role(), Role::System);
    assert!(messages[0].content().contains("grade 5"));
    assert_eq!(messages[1].role(), Role::SystemMemory);
    assert_eq!(messages[1].speaker(), Some(MEMORY_SPEAKER));
    assert_eq!(messages[1].content(), "I learned Ana loves pizza");
    assert_eq!(messages[2], Message::user("Ana", "Do you like pizza?"));

    assert_eq!(requests[0].params.max_tokens, 100);
}

#[tokio::test]
async fn empty_store_means_no_memories() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    assert!(convo.retrieve_memories().await.unwrap().is_empty());
    convo.respond("hello").await.unwrap();

    let messages = &chat.reply_requests()[0].messages;
    assert!(messages.iter().all(|m| m.role() != Role::SystemMemory));
}

#[tokio::test]
async fn memories_are_capped_at_memory_count() {
    let chat = ScriptedChat::new();
    let store = memory_store();
    for topic in ["pizza", "soccer", "music", "school", "cat", "dog"] {
        store.add_now(&format!("We talked about {topic}")).await.unwrap();
    }
    let mut convo = conversation(chat.clone(), store);

    convo.respond("tell me something").await.unwrap();

    let messages = &chat.reply_requests()[0].messages;
    let memories = messages
        .iter()
        .filter(|m| m.role() == Role::SystemMemory)
        .count();
    assert_eq!(memories, 4);
}

#[tokio::test]
async fn exit_flush_archives_short_history_once() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    run_turns(&mut convo, 1, 3).await;
    let record = convo.finish().await.unwrap().expect("a memory");

    assert!(convo.history().is_empty());
    assert_eq!(convo.store().count().unwrap(), 1);
    assert!(record.summary.contains("Ana: message 1"));
    assert!(record.summary.contains("Lingo: reply 3"));

    let summaries = chat.summary_requests();
    assert_eq!(summaries.len(), 1);
    assert_eq!(
        summaries[0].messages[0].content().lines().filter(|l| l.starts_with("Ana:")).count(),
        3
    );
}

#[tokio::test]
async fn exit_flush_of_empty_history_is_noop() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());

    assert!(convo.finish().await.unwrap().is_none());
    assert!(chat.requests().is_empty());
    assert_eq!(convo.store().count().unwrap(), 0);
}

#[tokio::test]
async fn failed_generation_leaves_history_untouched() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());
    run_turns(&mut convo, 1, 1).await;

    chat.set_fail_replies(true);
    let err = convo.respond("message 2").await.unwrap_err();
    assert!(matches!(err, Error::Llm(_)), "got {err:?}");
    assert_eq!(convo.history().len(), 2);

    chat.set_fail_replies(false);
    convo.respond("message 2").await.unwrap();
    let users = convo
        .history()
        .iter()
        .filter(|m| m.content() == "message 2")
        .count();
    assert_eq!(users, 1);
    assert_eq!(convo.history().len(), 4);
}

#[tokio::test]
async fn failed_archive_keeps_history_and_retries() {
    let chat = ScriptedChat::new();
    let mut convo = conversation(chat.clone(), memory_store());
    run_turns(&mut convo, 1, 9).await;

    chat.set_fail_summaries(true);
    let reply = convo.respond("message 10").await.unwrap();
    assert_eq!(reply, "reply 10");
    assert_eq!(convo.history().len(), 20);
    assert_eq!(convo.store().count().unwrap(), 0);

    chat.set_fail_summaries(false);
    run_turns(&mut convo, 11, 1).await;
    assert_eq!(convo.history().len(), 12);
    assert_eq!(convo.store().count().unwrap(), 1);
    assert_eq!(convo.history()[0], Message::user("Ana", "message 6"));
}

#[tokio::test]
async fn memories_from_one_session_reach_the_next() {
    let store = memory_store();

    let first_chat = ScriptedChat::new();
    let mut first = conversation(first_chat, store.clone());
    first.respond("My cat is called Miso").await.unwrap();
    first.finish().await.unwrap();

    let second_chat = ScriptedChat::new();
    let mut second = conversation(second_chat.clone(), store);
    second.respond("How is my cat?").await.unwrap();

    let messages = &second_chat.reply_requests()[0].messages;
    assert_eq!(messages[1].role(), Role::SystemMemory);
    assert!(messages[1].content().contains("Miso"));
}

#[tokio::test]
async fn failed_checkpoint_still_evicts_the_block() {
    let chat = ScriptedChat::new();
    let mut convo = Conversation::new(
        chat.clone(),
        UncheckpointedStore(memory_store()),
        ConversationConfig::new("Ana", "5"),
    );

    run_turns(&mut convo, 1, 10).await;
    assert_eq!(convo.history().len(), 10);
    assert_eq!(convo.store().count().unwrap(), 1);

    // The same block must not be summarized again
    run_turns(&mut convo, 11, 1).await;
    assert_eq!(convo.history().len(), 12);
    assert_eq!(convo.store().count().unwrap(), 1);
    assert_eq!(chat.summary_requests().len(), 1);
}

#[tokio::test]
async fn failed_checkpoint_does_not_fail_exit_flush() {
    let chat = ScriptedChat::new();
    let mut convo = Conversation::new(
        chat,
        UncheckpointedStore(memory_store()),
        ConversationConfig::new("Ana", "5"),
    );

    run_turns(&mut convo, 1, 2).await;
    let record = convo.finish().await.unwrap().expect("a memory");

    assert!(record.summary.contains("Ana: message 1"));
    assert!(convo.history().is_empty());
    assert_eq!(convo.store().count().unwrap(), 1);
}
