//! Single-slot cache of refreshable answers
//!
//! Keeps the latest answer per `(chat, user)` so a "refresh" can recompute it
//! from the original input. A new answer for the same pair overwrites the
//! slot; there is no expiry.

use crate::parser::ParsedAssistantReply;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// The answer most recently delivered to a `(chat, user)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Message the answer replied to
    pub message_id: i64,
    /// Text the user sent
    pub input_text: String,
    /// Parsed model reply behind the rendered answer
    pub reply: ParsedAssistantReply,
    /// Pairs this answer inserted into the vocabulary
    pub added_words: BTreeMap<String, String>,
}

/// Refreshable answers keyed by `(chat_id, user_id)`
#[derive(Clone)]
pub struct ResponseCache {
    slots: Cache<(i64, i64), Arc<CachedResponse>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Cache::builder().build(),
        }
    }

    /// Store an answer, replacing whatever the pair had before
    pub async fn store(&self, chat_id: i64, user_id: i64, response: CachedResponse) {
        debug!(
            "Storing response for chat_id={chat_id}, user_id={user_id}, message_id={}",
            response.message_id
        );
        self.slots.insert((chat_id, user_id), Arc::new(response)).await;
    }

    /// Look up the answer for `message_id`.
    ///
    /// Returns `None` when the pair has no answer or its answer belongs to a
    /// different message.
    pub async fn find(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Option<Arc<CachedResponse>> {
        self.slots
            .get(&(chat_id, user_id))
            .await
            .filter(|cached| cached.message_id == message_id)
    }

    /// Forget which words the answer to `message_id` added.
    ///
    /// Runs atomically on the slot and leaves it untouched when it now holds
    /// another message's answer. Returns the rewritten answer.
    pub async fn forget_added_words(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Option<Arc<CachedResponse>> {
        let result = self
            .slots
            .entry((chat_id, user_id))
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().message_id == message_id => {
                        Op::Put(Arc::new(CachedResponse {
                            added_words: BTreeMap::new(),
                            ..CachedResponse::clone(entry.value())
                        }))
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::ReplacedWith(entry) => Some(entry.into_value()),
            _ => {
                debug!("Answer to message {message_id} was replaced; nothing to forget");
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn response(message_id: i64, input: &str) -> CachedResponse {
        CachedResponse {
            message_id,
            input_text: input.to_string(),
            reply: ParsedAssistantReply {
                corrected: Some(input.to_uppercase()),
                ..ParsedAssistantReply::default()
            },
            added_words: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_find_requires_matching_message() {
        let cache = ResponseCache::new();
        cache.store(10, 20, response(1, "uno")).await;

        assert!(cache.find(10, 20, 2).await.is_none());
        let found = cache.find(10, 20, 1).await.expect("cached");
        assert_eq!(found.input_text, "uno");
    }

    #[tokio::test]
    async fn test_store_overwrites_slot() {
        let cache = ResponseCache::new();
        cache.store(10, 20, response(1, "uno")).await;
        cache.store(10, 20, response(2, "due")).await;

        assert!(cache.find(10, 20, 1).await.is_none());
        assert_eq!(
            cache.find(10, 20, 2).await.map(|c| c.input_text.clone()),
            Some("due".to_string())
        );
    }

    #[tokio::test]
    async fn test_slots_are_per_chat_and_user() {
        let cache = ResponseCache::new();
        cache.store(10, 20, response(1, "uno")).await;

        assert!(cache.find(10, 21, 1).await.is_none());
        assert!(cache.find(11, 20, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_forget_added_words_of_current_answer() {
        let cache = ResponseCache::new();
        let mut answer = response(1, "uno");
        answer.added_words = BTreeMap::from([("uno".to_string(), "один".to_string())]);
        cache.store(10, 20, answer).await;

        let updated = cache.forget_added_words(10, 20, 1).await.expect("current");

        assert!(updated.added_words.is_empty());
        assert_eq!(updated.input_text, "uno");
        let stored = cache.find(10, 20, 1).await.expect("cached");
        assert!(stored.added_words.is_empty());
    }

    #[tokio::test]
    async fn test_forget_added_words_leaves_newer_answer_alone() {
        let cache = ResponseCache::new();
        let mut newer = response(2, "due");
        newer.added_words = BTreeMap::from([("due".to_string(), "два".to_string())]);
        cache.store(10, 20, newer.clone()).await;

        assert!(cache.forget_added_words(10, 20, 1).await.is_none());
        assert_eq!(cache.find(10, 20, 2).await.as_deref(), Some(&newer));
    }
}
