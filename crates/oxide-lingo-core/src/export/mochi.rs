//! Mochi Cards client

use super::{CardExporter, ExportError, ExportReport};
use crate::config::{MOCHI_API_BASE, MOCHI_PAGE_LIMIT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Card {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CardsPage {
    #[serde(default)]
    docs: Vec<Card>,
    bookmark: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewCard<'a> {
    #[serde(rename = "deck-id")]
    deck_id: &'a str,
    content: &'a str,
}

/// Card content for one word pair
#[must_use]
pub fn card_content(key: &str, value: &str) -> String {
    format!("# {key}\n---\n{value}")
}

/// HTTP client for the Mochi Cards API
#[derive(Clone)]
pub struct MochiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MochiClient {
    /// Create a client for the public Mochi API
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, MOCHI_API_BASE)
    }

    /// Create a client against a custom base URL
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    async fn existing_contents(&self, deck_id: &str) -> Result<HashSet<String>, ExportError> {
        let mut contents = HashSet::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/cards", self.base_url))
                .basic_auth(&self.api_key, None::<&str>)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[("deck-id", deck_id)])
                .query(&[("limit", MOCHI_PAGE_LIMIT)]);
            if let Some(mark) = &bookmark {
                request = request.query(&[("bookmark", mark.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExportError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let page: CardsPage = response.json().await?;
            let page_was_empty = page.docs.is_empty();
            contents.extend(page.docs.into_iter().map(|c| c.content.trim().to_string()));

            match page.bookmark {
                Some(mark) if !page_was_empty => bookmark = Some(mark),
                _ => break,
            }
        }

        debug!("Deck {deck_id} already has {} cards", contents.len());
        Ok(contents)
    }

    async fn save_one(&self, deck_id: &str, content: &str) -> Result<bool, ExportError> {
        let response = self
            .client
            .post(format!("{}/cards", self.base_url))
            .basic_auth(&self.api_key, None::<&str>)
            .json(&NewCard { deck_id, content })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("Could not save card ({status}): {body}");
            Ok(false)
        }
    }
}

#[async_trait]
impl CardExporter for MochiClient {
    async fn save(
        &self,
        deck_id: &str,
        words: &BTreeMap<String, Vec<String>>,
    ) -> Result<ExportReport, ExportError> {
        let existing = self.existing_contents(deck_id).await?;

        let mut report = ExportReport::default();
        for (key, values) in words {
            for value in values {
                let content = card_content(key, value);
                if existing.contains(&content) {
                    debug!("Card for {key} is already in deck {deck_id}");
                } else if self.save_one(deck_id, &content).await? {
                    report.saved += 1;
                } else {
                    report.rejected += 1;
                    continue;
                }
                report.delivered.push((key.clone(), value.clone()));
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_content_format() {
        assert_eq!(card_content("casa", "дім"), "# casa\n---\nдім");
    }

    #[test]
    fn test_page_deserializes_without_bookmark() {
        let page: CardsPage =
            serde_json::from_str(r#"{"docs":[{"id":"x","content":" # a\n---\nb "}]}"#)
                .expect("valid json");
        assert_eq!(page.docs.len(), 1);
        assert!(page.bookmark.is_none());
    }

    #[test]
    fn test_new_card_uses_dashed_deck_field() {
        let body = serde_json::to_value(NewCard {
            deck_id: "deck",
            content: "c",
        })
        .expect("serialize");
        assert_eq!(body["deck-id"], "deck");
        assert_eq!(body["content"], "c");
    }
}
