//! Application callbacks fed with decrypted messages.
//!
//! A handler sees one plaintext message and returns one plaintext response.
//! It may block or fail; a failure ends the connection it was called for.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ApplicationError;

#[async_trait]
pub trait ApplicationHandler: Send + Sync + Debug {
    async fn handle_message(&self, message: &[u8]) -> Result<Vec<u8>, ApplicationError>;
}

pub const DEFAULT_ECHO_SUFFIX: &str = " too!";

/// Replies with the message followed by a fixed suffix.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    suffix: Vec<u8>,
}

impl EchoHandler {
    pub fn new(suffix: impl Into<Vec<u8>>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_SUFFIX)
    }
}

#[async_trait]
impl ApplicationHandler for EchoHandler {
    async fn handle_message(&self, message: &[u8]) -> Result<Vec<u8>, ApplicationError> {
        let mut response = Vec::with_capacity(message.len() + self.suffix.len());
        response.extend_from_slice(message);
        response.extend_from_slice(&self.suffix);
        Ok(response)
    }
}

/// Counts how many times each distinct message has been seen.
pub trait WordCountStore: Send + Sync + Debug {
    /// Atomically adds one to the count for `word` and returns the new count.
    fn increment(&self, word: &str) -> Result<u64, ApplicationError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWordCountStore {
    counts: DashMap<String, u64>,
}

impl InMemoryWordCountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, word: &str) -> u64 {
        self.counts.get(word).map(|c| *c).unwrap_or(0)
    }
}

impl WordCountStore for InMemoryWordCountStore {
    fn increment(&self, word: &str) -> Result<u64, ApplicationError> {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut count = self.counts.entry(word.to_string()).or_insert(0);
        *count = count
            .checked_add(1)
            .ok_or_else(|| ApplicationError::new(format!("count overflow for '{word}'")))?;
        Ok(*count)
    }
}

/// Answers with how often the message has been heard before.
#[derive(Debug, Clone)]
pub struct WordCountHandler {
    store: Arc<dyn WordCountStore>,
}

impl WordCountHandler {
    pub fn new(store: Arc<dyn WordCountStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ApplicationHandler for WordCountHandler {
    async fn handle_message(&self, message: &[u8]) -> Result<Vec<u8>, ApplicationError> {
        let word = std::str::from_utf8(message)
            .map_err(|e| ApplicationError::new(format!("message is not UTF-8: {e}")))?;

        let count = self.store.increment(word)?;
        let response = if count == 1 {
            format!("'{word}'...わたし、気になります！")
        } else {
            format!("'{word}'はもう{count}回も聞いたのでわたし、気になりません！")
        };
        Ok(response.into_bytes())
    }
}
