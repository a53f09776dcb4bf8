//! End-to-end assistant flow over a file-backed vocabulary.

use async_trait::async_trait;
use oxide_lingo_core::assistant::{AssistanceOutcome, LanguageAssistant, RefreshOutcome};
use oxide_lingo_core::llm::{LlmError, ModelService};
use oxide_lingo_core::rate_limit::RateLimiter;
use oxide_lingo_core::response_cache::ResponseCache;
use oxide_lingo_core::storage::{FileRecordStore, VocabularyStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Answers from a fixed table keyed by user text
struct ScriptedModel {
    replies: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl ModelService for ScriptedModel {
    async fn ask(&self, _system_prompt: &str, user_text: &str) -> Result<String, LlmError> {
        self.replies
            .get(user_text)
            .map(|reply| (*reply).to_string())
            .ok_or_else(|| LlmError::NetworkError("no scripted reply".to_string()))
    }
}

fn assistant(dir: &std::path::Path) -> LanguageAssistant {
    let model = ScriptedModel {
        replies: HashMap::from([
            ("cio'", "-"),
            (
                "Ieri ho andato al mare",
                "::corrected::\nIeri *sono andato* al mare\n::words::\nandare al mare - ходити на море\nieri - вчора",
            ),
        ]),
    };
    LanguageAssistant::new(
        Arc::new(VocabularyStore::new(Arc::new(FileRecordStore::new(dir)))),
        Arc::new(ResponseCache::new()),
        Arc::new(RateLimiter::new(100, HashSet::new(), 2)),
        Arc::new(model),
    )
}

#[tokio::test]
async fn apostrophe_accent_leaves_no_trace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(dir.path());

    let outcome = assistant.handle(1, 1, 1, "cio'").await.expect("handle");

    assert_eq!(outcome, AssistanceOutcome::Empty);
    assert!(!dir.path().join("1.txt").exists());
}

#[tokio::test]
async fn words_survive_a_restart_and_refresh() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let assistant = assistant(dir.path());
        let outcome = assistant
            .handle(5, 9, 100, "Ieri ho andato al mare")
            .await
            .expect("handle");
        let AssistanceOutcome::Reply { new_words, .. } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(new_words.len(), 2);

        let refreshed = assistant.refresh(5, 9, 100).await.expect("refresh");
        assert!(matches!(
            refreshed,
            RefreshOutcome::Refreshed(AssistanceOutcome::Reply { .. })
        ));
    }

    let reopened = assistant(dir.path());
    let entries = reopened
        .vocabulary()
        .find_all_entries(9)
        .await
        .expect("read");
    let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["andare al mare", "ieri"]);

    // The cache does not survive a restart.
    assert_eq!(
        reopened.refresh(5, 9, 100).await.expect("refresh"),
        RefreshOutcome::Expired
    );
}
