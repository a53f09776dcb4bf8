//! Per-user vocabulary store.
//!
//! Entries are persisted as `{id} :: {key} :: {value}` lines, sorted by key.
//! Every mutation is a full read-modify-write of the user's collection under
//! a per-user lock; different users never wait on each other.

use super::{PersistenceError, RecordStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Separator between the fields of a persisted entry line
pub const FIELD_SEPARATOR: &str = " :: ";

/// One learned word or phrase of a single user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VocabularyEntry {
    /// Stable identifier, never reused
    pub id: Uuid,
    /// Source-language term, trimmed and lower-cased
    pub key: String,
    /// Translation, trimmed and lower-cased
    pub value: String,
}

impl VocabularyEntry {
    fn to_line(&self) -> String {
        format!(
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.id, self.key, self.value
        )
    }

    fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, FIELD_SEPARATOR).map(str::trim);
        let id = Uuid::parse_str(fields.next()?).ok()?;
        let key = fields.next().filter(|f| !f.is_empty())?;
        let value = fields.next().filter(|f| !f.is_empty())?;
        Some(Self {
            id,
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn matches(&self, key: &str, value: &str) -> bool {
        self.key == key && self.value == value
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Durable per-user vocabulary with dedup-on-write and cyclic review navigation
pub struct VocabularyStore {
    records: Arc<dyn RecordStore>,
    user_locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl VocabularyStore {
    /// Create a vocabulary store over a record store
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            user_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.user_locks.read().await;
            locks.get(&user_id).cloned()
        };

        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.user_locks.write().await;
                locks.entry(user_id).or_default().clone()
            }
        };

        lock.lock_owned().await
    }

    async fn load(&self, user_id: i64) -> Result<Vec<VocabularyEntry>, PersistenceError> {
        let lines = self.records.read_lines(user_id).await?;

        let mut entries: Vec<VocabularyEntry> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let entry = VocabularyEntry::from_line(line);
                if entry.is_none() {
                    warn!("Skipping malformed vocabulary line for user {user_id}");
                }
                entry
            })
            .collect();

        // Stable: ties keep file order, which is insertion order
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn persist(
        &self,
        user_id: i64,
        entries: &mut [VocabularyEntry],
    ) -> Result<(), PersistenceError> {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let lines: Vec<String> = entries.iter().map(VocabularyEntry::to_line).collect();
        self.records.replace_lines(user_id, &lines).await
    }

    /// All words of a user grouped by key, in key order
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn find_all(
        &self,
        user_id: i64,
    ) -> Result<BTreeMap<String, Vec<String>>, PersistenceError> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.load(user_id).await? {
            grouped.entry(entry.key).or_default().push(entry.value);
        }
        Ok(grouped)
    }

    /// All entries of a user sorted by key (insertion order for equal keys)
    ///
    /// This is the review sequence used by [`Self::next`] and [`Self::back`].
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn find_all_entries(
        &self,
        user_id: i64,
    ) -> Result<Vec<VocabularyEntry>, PersistenceError> {
        self.load(user_id).await
    }

    /// Save word pairs, skipping the ones the user already has.
    ///
    /// Keys and values are trimmed and lower-cased first. Pairs that are blank
    /// or contain [`FIELD_SEPARATOR`] are dropped. Returns exactly the pairs
    /// that became new entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn save(
        &self,
        user_id: i64,
        pairs: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, PersistenceError> {
        let _guard = self.lock_user(user_id).await;
        let mut entries = self.load(user_id).await?;

        let existing: HashSet<(String, String)> = entries
            .iter()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect();

        let mut inserted = BTreeMap::new();
        for (raw_key, raw_value) in pairs {
            let (key, value) = (normalize(raw_key), normalize(raw_value));
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if key.contains(FIELD_SEPARATOR.trim()) || value.contains(FIELD_SEPARATOR.trim()) {
                warn!("Rejecting pair containing the field separator for user {user_id}");
                continue;
            }
            if existing.contains(&(key.clone(), value.clone())) || inserted.contains_key(&key) {
                continue;
            }
            inserted.insert(key, value);
        }

        if inserted.is_empty() {
            debug!("No new words for user {user_id}");
            return Ok(inserted);
        }

        entries.extend(inserted.iter().map(|(key, value)| VocabularyEntry {
            id: Uuid::new_v4(),
            key: key.clone(),
            value: value.clone(),
        }));
        self.persist(user_id, &mut entries).await?;

        info!("Saved {} new words for user {user_id}", inserted.len());
        Ok(inserted)
    }

    /// Delete one entry and return the entry to show in its place.
    ///
    /// The replacement is the entry now at the same position, else the first
    /// entry, else `None`. Unknown IDs are a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn delete(
        &self,
        user_id: i64,
        entry_id: Uuid,
    ) -> Result<Option<VocabularyEntry>, PersistenceError> {
        let _guard = self.lock_user(user_id).await;
        let mut entries = self.load(user_id).await?;

        let Some(index) = entries.iter().position(|e| e.id == entry_id) else {
            return Ok(None);
        };

        entries.remove(index);
        self.persist(user_id, &mut entries).await?;
        info!("Deleted entry {entry_id} for user {user_id}");

        Ok(entries.get(index).or_else(|| entries.first()).cloned())
    }

    /// Delete every entry matching one of the given pairs exactly.
    ///
    /// Pairs are normalized the same way [`Self::save`] normalizes them.
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn delete_pairs<I, K, V>(
        &self,
        user_id: i64,
        pairs: I,
    ) -> Result<usize, PersistenceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let normalized: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (normalize(k.as_ref()), normalize(v.as_ref())))
            .collect();
        if normalized.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock_user(user_id).await;
        let mut entries = self.load(user_id).await?;
        let before = entries.len();
        entries.retain(|e| !normalized.iter().any(|(k, v)| e.matches(k, v)));

        let removed = before - entries.len();
        if removed > 0 {
            self.persist(user_id, &mut entries).await?;
            info!("Retracted {removed} words for user {user_id}");
        }
        Ok(removed)
    }

    /// Remove the user's whole collection
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub async fn delete_all(&self, user_id: i64) -> Result<(), PersistenceError> {
        let _guard = self.lock_user(user_id).await;
        self.records.replace_lines(user_id, &[]).await?;
        info!("Cleared vocabulary for user {user_id}");
        Ok(())
    }

    /// Entry after `entry_id` in review order, wrapping to the first
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn next(
        &self,
        user_id: i64,
        entry_id: Uuid,
    ) -> Result<Option<VocabularyEntry>, PersistenceError> {
        let entries = self.load(user_id).await?;
        let Some(index) = entries.iter().position(|e| e.id == entry_id) else {
            return Ok(None);
        };
        Ok(entries.get((index + 1) % entries.len()).cloned())
    }

    /// Entry before `entry_id` in review order, wrapping to the last
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn back(
        &self,
        user_id: i64,
        entry_id: Uuid,
    ) -> Result<Option<VocabularyEntry>, PersistenceError> {
        let entries = self.load(user_id).await?;
        let Some(index) = entries.iter().position(|e| e.id == entry_id) else {
            return Ok(None);
        };
        let previous = index.checked_sub(1).unwrap_or(entries.len() - 1);
        Ok(entries.get(previous).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryRecordStore, MockRecordStore};

    fn store() -> VocabularyStore {
        VocabularyStore::new(Arc::new(MemoryRecordStore::new()))
    }

    fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_save_dedups_and_reports_new_pairs() {
        let store = store();
        let words = pairs(&[("ciao", "привіт"), ("grazie", "дякую")]);

        let first = store.save(1, &words).await.expect("save");
        assert_eq!(first, words);

        let second = store.save(1, &words).await.expect("save");
        assert!(second.is_empty());
        assert_eq!(store.find_all_entries(1).await.expect("read").len(), 2);
    }

    #[tokio::test]
    async fn test_save_normalizes_case_and_whitespace() {
        let store = store();
        let inserted = store
            .save(1, &pairs(&[("  Ciao ", " Привіт")]))
            .await
            .expect("save");
        assert_eq!(inserted, pairs(&[("ciao", "привіт")]));

        let again = store.save(1, &pairs(&[("CIAO", "привіт")])).await.expect("save");
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_with_new_value_is_inserted() {
        let store = store();
        store.save(1, &pairs(&[("casa", "дім")])).await.expect("save");
        let inserted = store.save(1, &pairs(&[("casa", "будинок")])).await.expect("save");
        assert_eq!(inserted.len(), 1);

        let grouped = store.find_all(1).await.expect("read");
        assert_eq!(grouped["casa"], vec!["дім", "будинок"]);
    }

    #[tokio::test]
    async fn test_blank_and_separator_pairs_are_dropped() {
        let store = store();
        let inserted = store
            .save(1, &pairs(&[(" ", "x"), ("a", " "), ("a :: b", "c"), ("ok", "добре")]))
            .await
            .expect("save");
        assert_eq!(inserted, pairs(&[("ok", "добре")]));
    }

    #[tokio::test]
    async fn test_entries_sorted_by_key() {
        let store = store();
        store
            .save(1, &pairs(&[("zaino", "рюкзак"), ("albero", "дерево"), ("mela", "яблуко")]))
            .await
            .expect("save");

        let keys: Vec<String> = store
            .find_all_entries(1)
            .await
            .expect("read")
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["albero", "mela", "zaino"]);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = store();
        store.save(1, &pairs(&[("ciao", "привіт")])).await.expect("save");
        assert!(store.find_all(2).await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn test_cyclic_navigation() {
        let store = store();
        store
            .save(1, &pairs(&[("a", "1"), ("b", "2"), ("c", "3")]))
            .await
            .expect("save");
        let entries = store.find_all_entries(1).await.expect("read");
        let (first, last) = (&entries[0], &entries[2]);

        let after_last = store.next(1, last.id).await.expect("next");
        assert_eq!(after_last.as_ref(), Some(first));

        let before_first = store.back(1, first.id).await.expect("back");
        assert_eq!(before_first.as_ref(), Some(last));

        let middle = store.next(1, first.id).await.expect("next").expect("entry");
        let returned = store.back(1, middle.id).await.expect("back").expect("entry");
        assert_eq!(returned.id, first.id);
    }

    #[tokio::test]
    async fn test_navigation_single_entry_and_unknown_id() {
        let store = store();
        assert_eq!(store.next(1, Uuid::new_v4()).await.expect("next"), None);

        store.save(1, &pairs(&[("solo", "один")])).await.expect("save");
        let only = store.find_all_entries(1).await.expect("read").remove(0);

        assert_eq!(store.next(1, only.id).await.expect("next"), Some(only.clone()));
        assert_eq!(store.back(1, only.id).await.expect("back"), Some(only));
        assert_eq!(store.back(1, Uuid::new_v4()).await.expect("back"), None);
    }

    #[tokio::test]
    async fn test_delete_returns_replacement() {
        let store = store();
        store
            .save(1, &pairs(&[("a", "1"), ("b", "2"), ("c", "3")]))
            .await
            .expect("save");
        let entries = store.find_all_entries(1).await.expect("read");

        // Middle: the next entry slides into position
        let shown = store.delete(1, entries[1].id).await.expect("delete");
        assert_eq!(shown.map(|e| e.key), Some("c".to_string()));

        // Last: wraps to first
        let shown = store.delete(1, entries[2].id).await.expect("delete");
        assert_eq!(shown.map(|e| e.key), Some("a".to_string()));

        // Only one left: empty afterwards
        let shown = store.delete(1, entries[0].id).await.expect("delete");
        assert_eq!(shown, None);
        assert!(store.find_all_entries(1).await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_noop() {
        let store = store();
        store.save(1, &pairs(&[("a", "1")])).await.expect("save");
        assert_eq!(store.delete(1, Uuid::new_v4()).await.expect("delete"), None);
        assert_eq!(store.find_all_entries(1).await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_pairs_only_removes_exact_matches() {
        let store = store();
        store
            .save(1, &pairs(&[("casa", "дім"), ("mela", "яблуко")]))
            .await
            .expect("save");
        store.save(1, &pairs(&[("casa", "будинок")])).await.expect("save");

        let removed = store
            .delete_pairs(1, &pairs(&[("Casa", "дім"), ("mela", "груша")]))
            .await
            .expect("delete");
        assert_eq!(removed, 1);

        let grouped = store.find_all(1).await.expect("read");
        assert_eq!(grouped["casa"], vec!["будинок"]);
        assert_eq!(grouped["mela"], vec!["яблуко"]);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = store();
        store.save(1, &pairs(&[("a", "1"), ("b", "2")])).await.expect("save");
        store.delete_all(1).await.expect("clear");
        assert!(store.find_all(1).await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let records = Arc::new(MemoryRecordStore::new());
        let id = Uuid::new_v4();
        records
            .replace_lines(
                1,
                &[
                    format!("{id} :: ciao :: привіт"),
                    "garbage".to_string(),
                    "not-a-uuid :: a :: b".to_string(),
                    String::new(),
                ],
            )
            .await
            .expect("seed");

        let store = VocabularyStore::new(records);
        let entries = store.find_all_entries(1).await.expect("read");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let mut records = MockRecordStore::new();
        records.expect_read_lines().returning(|_| Ok(Vec::new()));
        records.expect_replace_lines().returning(|_, _| {
            Err(PersistenceError::Io(std::io::Error::other("disk full")))
        });

        let store = VocabularyStore::new(Arc::new(records));
        let result = store.save(1, &pairs(&[("a", "1")])).await;
        assert!(matches!(result, Err(PersistenceError::Io(_))));
    }

    #[tokio::test]
    async fn test_concurrent_saves_for_same_user_keep_all_words() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let word = format!("word{i}");
                store
                    .save(1, &pairs(&[(word.as_str(), "x")]))
                    .await
                    .expect("save");
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(store.find_all_entries(1).await.expect("read").len(), 20);
    }
}
