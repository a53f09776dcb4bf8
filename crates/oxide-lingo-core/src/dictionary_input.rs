//! Manual dictionary input.
//!
//! Users can add words directly by sending lines like `casa :: дім`, or just
//! `casa ::` to have the model fill in the translation.

use std::collections::{BTreeMap, BTreeSet};

const LINE_SEPARATOR: &str = "::";

/// Words a user typed in for the dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryInput {
    /// Pairs given with their translation
    pub translated: BTreeMap<String, String>,
    /// Keys that still need a translation
    pub untranslated: BTreeSet<String>,
}

impl DictionaryInput {
    /// Whether `text` is meant as dictionary input: every line contains `::`.
    #[must_use]
    pub fn is_dictionary_input(text: &str) -> bool {
        let mut lines = text.lines().peekable();
        lines.peek().is_some() && lines.all(|line| line.contains(LINE_SEPARATOR))
    }

    /// Parse dictionary lines.
    ///
    /// Lines with two non-blank parts are ready pairs, lines with one are keys
    /// to translate, anything else is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_lingo_core::dictionary_input::DictionaryInput;
    ///
    /// let input = DictionaryInput::parse("casa :: дім\nmela ::");
    /// assert_eq!(input.translated["casa"], "дім");
    /// assert!(input.untranslated.contains("mela"));
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut input = Self::default();
        for line in text.lines() {
            let parts: Vec<&str> = line
                .split(LINE_SEPARATOR)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect();
            match parts.as_slice() {
                [key, value] => {
                    input.translated.insert((*key).to_string(), (*value).to_string());
                }
                [key] => {
                    input.untranslated.insert((*key).to_string());
                }
                _ => {}
            }
        }
        input
    }

    /// Whether the model has to be asked for translations
    #[must_use]
    pub fn needs_translation(&self) -> bool {
        !self.untranslated.is_empty()
    }

    /// Model input for the translation prompt: one key per line
    #[must_use]
    pub fn translation_request(&self) -> String {
        self.untranslated
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse `key=value` lines from a translation reply
#[must_use]
pub fn parse_translations(reply: &str) -> BTreeMap<String, String> {
    reply
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
