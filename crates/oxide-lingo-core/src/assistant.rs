//! Assistant pipeline
//!
//! [`LanguageAssistant`] ties the core together: rate limit, model call,
//! reply parsing, vocabulary persistence and the refresh cache. It returns
//! typed outcomes and leaves all wording to the transport.

use crate::dictionary_input::{parse_translations, DictionaryInput};
use crate::llm::{LlmError, ModelService};
use crate::parser::{parse_reply, ParsedAssistantReply};
use crate::prompts::{ANALYZE_PROMPT, TRANSLATE_WORDS_PROMPT};
use crate::rate_limit::RateLimiter;
use crate::response_cache::{CachedResponse, ResponseCache};
use crate::storage::{PersistenceError, VocabularyStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures the assistant reports to its caller
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The subject used up its daily requests
    #[error("Daily request limit reached for {subject_id}")]
    RateLimitExceeded {
        /// Subject that hit the limit
        subject_id: i64,
    },
    /// The model could not produce an answer
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] LlmError),
    /// The vocabulary could not be read or written
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of analyzing one user text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistanceOutcome {
    /// Nothing to correct; nothing was stored
    Empty,
    /// A structured answer
    Reply {
        /// Parsed model reply
        parsed: ParsedAssistantReply,
        /// Pairs that became new vocabulary entries
        new_words: BTreeMap<String, String>,
    },
}

/// Result of a refresh request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The answer is no longer cached
    Expired,
    /// The answer was recomputed
    Refreshed(AssistanceOutcome),
}

/// Result of a manual dictionary addition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualAddOutcome {
    /// Pairs that became new vocabulary entries
    pub inserted: BTreeMap<String, String>,
    /// Whether the model was asked for translations
    pub translated: bool,
}

/// Orchestrates one user's requests against the shared services
pub struct LanguageAssistant {
    vocabulary: Arc<VocabularyStore>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    model: Arc<dyn ModelService>,
}

impl LanguageAssistant {
    /// Create an assistant over shared services
    #[must_use]
    pub fn new(
        vocabulary: Arc<VocabularyStore>,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        model: Arc<dyn ModelService>,
    ) -> Self {
        Self {
            vocabulary,
            cache,
            limiter,
            model,
        }
    }

    /// Vocabulary store behind this assistant
    #[must_use]
    pub fn vocabulary(&self) -> &Arc<VocabularyStore> {
        &self.vocabulary
    }

    /// Analyze `text` sent by `user_id` as message `message_id`.
    ///
    /// New words are saved before the answer is cached. An empty reply
    /// touches neither the vocabulary nor the cache.
    ///
    /// # Errors
    ///
    /// * `RateLimitExceeded` when the user has no requests left today
    /// * `ModelUnavailable` when the model call fails
    /// * `Persistence` when the new words cannot be saved
    pub async fn handle(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<AssistanceOutcome, AssistantError> {
        self.charge(user_id)?;
        debug!("Analyzing message {message_id} from user {user_id}: {text}");

        let raw = self.ask(ANALYZE_PROMPT, text).await?;
        let Some(parsed) = parse_reply(&raw) else {
            info!("Nothing to correct in message {message_id} from user {user_id}");
            return Ok(AssistanceOutcome::Empty);
        };

        self.record(chat_id, user_id, message_id, text, parsed).await
    }

    /// Recompute the answer to `message_id`.
    ///
    /// The previous answer's words are retracted only once a new reply is in
    /// hand, so a failed or empty refresh leaves the vocabulary and the cache
    /// as they were.
    ///
    /// # Errors
    ///
    /// Same as [`Self::handle`].
    pub async fn refresh(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Result<RefreshOutcome, AssistantError> {
        let Some(cached) = self.cache.find(chat_id, user_id, message_id).await else {
            debug!("No refreshable answer for message {message_id} of user {user_id}");
            return Ok(RefreshOutcome::Expired);
        };

        info!("Refreshing answer to message {message_id} for user {user_id}");
        self.charge(user_id)?;
        let raw = self.ask(ANALYZE_PROMPT, &cached.input_text).await?;
        let Some(parsed) = parse_reply(&raw) else {
            info!("Refreshed answer to message {message_id} is empty; keeping the previous one");
            return Ok(RefreshOutcome::Refreshed(AssistanceOutcome::Empty));
        };

        if self.retract(chat_id, user_id, message_id).await?.is_none() {
            debug!("Answer to message {message_id} was replaced during refresh");
            return Ok(RefreshOutcome::Expired);
        }
        let outcome = self
            .record(chat_id, user_id, message_id, &cached.input_text, parsed)
            .await?;
        Ok(RefreshOutcome::Refreshed(outcome))
    }

    /// Take back the words the answer to `message_id` added.
    ///
    /// Returns the updated cache entry, or `None` if the answer expired.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the vocabulary cannot be rewritten.
    pub async fn discard_new_words(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Result<Option<CachedResponse>, AssistantError> {
        self.retract(chat_id, user_id, message_id).await
    }

    /// Add manually typed words, translating bare keys with the model.
    ///
    /// Input without bare keys is saved directly and costs no request.
    ///
    /// # Errors
    ///
    /// * `RateLimitExceeded` when translations are needed and none are left
    /// * `ModelUnavailable` when the translation call fails
    /// * `Persistence` when the words cannot be saved
    pub async fn add_entries(
        &self,
        user_id: i64,
        input: &DictionaryInput,
    ) -> Result<ManualAddOutcome, AssistantError> {
        if !input.needs_translation() {
            let inserted = self.vocabulary.save(user_id, &input.translated).await?;
            return Ok(ManualAddOutcome {
                inserted,
                translated: false,
            });
        }

        self.charge(user_id)?;
        let reply = self
            .ask(TRANSLATE_WORDS_PROMPT, &input.translation_request())
            .await?;

        let mut pairs = input.translated.clone();
        pairs.extend(parse_translations(&reply));

        let inserted = self.vocabulary.save(user_id, &pairs).await?;
        Ok(ManualAddOutcome {
            inserted,
            translated: true,
        })
    }

    fn charge(&self, user_id: i64) -> Result<(), AssistantError> {
        if self.limiter.check_and_increment(user_id) {
            Ok(())
        } else {
            Err(AssistantError::RateLimitExceeded {
                subject_id: user_id,
            })
        }
    }

    async fn ask(&self, system_prompt: &str, text: &str) -> Result<String, AssistantError> {
        self.model.ask(system_prompt, text).await.map_err(|e| {
            warn!("Model call failed: {e}");
            AssistantError::ModelUnavailable(e)
        })
    }

    /// Save the reply's words, then cache the answer
    async fn record(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
        text: &str,
        parsed: ParsedAssistantReply,
    ) -> Result<AssistanceOutcome, AssistantError> {
        let new_words = self
            .vocabulary
            .save(user_id, &parsed.words_or_empty())
            .await?;

        self.cache
            .store(
                chat_id,
                user_id,
                CachedResponse {
                    message_id,
                    input_text: text.to_string(),
                    reply: parsed.clone(),
                    added_words: new_words.clone(),
                },
            )
            .await;

        Ok(AssistanceOutcome::Reply { parsed, new_words })
    }

    /// Retract the cached answer's words and forget that it added any
    async fn retract(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> Result<Option<CachedResponse>, AssistantError> {
        let Some(cached) = self.cache.find(chat_id, user_id, message_id).await else {
            return Ok(None);
        };

        self.vocabulary
            .delete_pairs(user_id, &cached.added_words)
            .await?;

        Ok(self
            .cache
            .forget_added_words(chat_id, user_id, message_id)
            .await
            .map(|updated| CachedResponse::clone(&updated)))
    }
}
