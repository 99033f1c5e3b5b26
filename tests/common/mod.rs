//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lingo::db::Embed;
use lingo::{
    ChatModel, Conversation, ConversationConfig, GenerationParams, LlmError, MemoryStore,
    Message, Result,
};

/// Words the test embedder tells apart; everything else shares one bucket
pub const VOCAB: [&str; 12] = [
    "pizza", "soccer", "music", "school", "cat", "dog", "rain", "beach", "book", "movie",
    "family", "travel",
];

/// Deterministic bag-of-words embedder over [`VOCAB`]
pub struct VocabEmbedder;

#[async_trait]
impl Embed for VocabEmbedder {
    fn dimension(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; VOCAB.len() + 1];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let idx = VOCAB.iter().position(|v| *v == word).unwrap_or(VOCAB.len());
            v[idx] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[VOCAB.len()] = 1.0;
        } else {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

/// Embedder with a different dimension, for mismatch tests
pub struct WideEmbedder;

#[async_trait]
impl Embed for WideEmbedder {
    fn dimension(&self) -> usize {
        64
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.125; 64])
    }
}

/// A request the scripted model received
#[derive(Debug, Clone)]
pub struct Request {
    pub messages: Vec<Message>,
    pub params: GenerationParams,
}

impl Request {
    /// Archive summaries are requested as a single user message
    pub fn is_summary(&self) -> bool {
        self.messages.len() == 1 && self.messages[0].content().starts_with("you are ")
    }
}

/// Chat model that answers from a script and records every request
#[derive(Default)]
pub struct ScriptedChat {
    requests: Mutex<Vec<Request>>,
    replies: AtomicUsize,
    fail_replies: AtomicBool,
    fail_summaries: AtomicBool,
}

impl ScriptedChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_summaries(&self, fail: bool) {
        self.fail_summaries.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn summary_requests(&self) -> Vec<Request> {
        self.requests().into_iter().filter(Request::is_summary).collect()
    }

    pub fn reply_requests(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| !r.is_summary())
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn generate(&self, messages: &[Message], params: &GenerationParams) -> Result<String> {
        let request = Request {
            messages: messages.to_vec(),
            params: params.clone(),
        };
        let is_summary = request.is_summary();
        self.requests.lock().unwrap().push(request);

        if is_summary {
            if self.fail_summaries.load(Ordering::SeqCst) {
                return Err(LlmError::RateLimited("summaries unavailable".to_string()).into());
            }
            // Echo the transcript so the summary is searchable
            let transcript = messages[0]
                .content()
                .split_once("\n\n")
                .map_or("", |(_, t)| t)
                .replace('\n', " / ");
            return Ok(format!("I remember: {transcript}"));
        }

        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(LlmError::Provider {
                status: 500,
                body: "boom".to_string(),
            }
            .into());
        }

        let n = self.replies.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("reply {n}"))
    }
}

/// Set up an in-memory memory store
pub fn memory_store() -> MemoryStore {
    MemoryStore::in_memory(Arc::new(VocabEmbedder)).expect("failed to init test store")
}

/// A conversation for "Ana" at grade 5 over `store`
pub fn conversation(chat: Arc<ScriptedChat>, store: MemoryStore) -> Conversation {
    Conversation::new(chat, store, ConversationConfig::new("Ana", "5"))
}

/// Run `turns` user turns numbered from `start`
pub async fn run_turns(conversation: &mut Conversation, start: usize, turns: usize) {
    for i in start..start + turns {
        conversation
            .respond(&format!("message {i}"))
            .await
            .expect("turn failed");
    }
}
