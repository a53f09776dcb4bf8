//! Flashcard export
//!
//! Pushes a user's vocabulary to a flashcard deck and clears it locally once
//! the deck accepted the push.

mod mochi;

pub use mochi::MochiClient;

use crate::storage::{PersistenceError, VocabularyStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The card service answered with an error status
    #[error("Card API error {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
    /// The card service took none of the cards
    #[error("Card service rejected all {rejected} cards")]
    Rejected {
        /// Cards that were refused
        rejected: usize,
    },
    /// Reading or clearing the vocabulary failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Interface for flashcard services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardExporter: Send + Sync {
    /// Save words to a deck and report which pairs ended up in it
    async fn save(
        &self,
        deck_id: &str,
        words: &BTreeMap<String, Vec<String>>,
    ) -> Result<ExportReport, ExportError>;
}

/// What a card service did with one batch of words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Cards created by this batch
    pub saved: usize,
    /// Pairs that are in the deck now, created or already present
    pub delivered: Vec<(String, String)>,
    /// Cards the service refused
    pub rejected: usize,
}

/// Result of a vocabulary push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The user has no words
    NothingToExport,
    /// Delivered words were removed from the local vocabulary
    Exported {
        /// Cards created in the deck
        saved: usize,
        /// Words refused by the deck, still kept locally
        kept: usize,
    },
}

/// Moves vocabulary from the local store into a flashcard deck
pub struct FlashcardSync {
    vocabulary: Arc<VocabularyStore>,
    exporter: Arc<dyn CardExporter>,
    deck_id: String,
}

impl FlashcardSync {
    /// Create a sync targeting `deck_id`
    #[must_use]
    pub fn new(
        vocabulary: Arc<VocabularyStore>,
        exporter: Arc<dyn CardExporter>,
        deck_id: impl Into<String>,
    ) -> Self {
        Self {
            vocabulary,
            exporter,
            deck_id: deck_id.into(),
        }
    }

    /// Export the user's words, then remove the delivered ones locally.
    ///
    /// Only pairs the deck holds after the export are deleted. Words refused
    /// by the deck and words saved while the export ran stay in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the vocabulary or the export fails, or if
    /// the deck refused every card. The vocabulary is left untouched then.
    pub async fn push(&self, user_id: i64) -> Result<ExportOutcome, ExportError> {
        let words = self.vocabulary.find_all(user_id).await?;
        if words.is_empty() {
            return Ok(ExportOutcome::NothingToExport);
        }

        let report = match self.exporter.save(&self.deck_id, &words).await {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to export words for user {user_id}: {e}");
                return Err(e);
            }
        };

        if report.delivered.is_empty() {
            error!(
                "Deck {} refused all {} cards of user {user_id}",
                self.deck_id, report.rejected
            );
            return Err(ExportError::Rejected {
                rejected: report.rejected,
            });
        }

        let removed = self
            .vocabulary
            .delete_pairs(user_id, report.delivered.iter().map(|(k, v)| (k, v)))
            .await?;
        if report.rejected > 0 {
            warn!(
                "Deck {} refused {} cards of user {user_id}; they stay local",
                self.deck_id, report.rejected
            );
        }
        info!(
            "Exported {} new cards for user {user_id}, removed {removed} local words",
            report.saved
        );
        Ok(ExportOutcome::Exported {
            saved: report.saved,
            kept: report.rejected,
        })
    }
}
