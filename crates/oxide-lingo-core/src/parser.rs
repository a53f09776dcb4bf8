//! Structured model reply parsing.
//!
//! The model answers with `::label::` marker lines, each followed by the
//! section body. Parsing is lenient: unknown labels are kept but ignored,
//! malformed `words` lines are dropped, and nothing here ever fails.

use lazy_regex::regex;
use std::collections::{BTreeMap, HashMap};

/// Reply the model sends when there is nothing to correct.
pub const NOTHING_TO_SAY: &str = "-";

/// Section labels recognized in model replies.
pub mod labels {
    /// Corrected form of the user's sentence
    pub const CORRECTED: &str = "corrected";
    /// Explanation of the mistakes
    pub const EXPLANATION: &str = "explanation";
    /// Stylistic alternative
    pub const ALTERNATIVE: &str = "alternative";
    /// Ukrainian translation
    pub const TRANSLATION_UA: &str = "translation-ua";
    /// Italian translation
    pub const TRANSLATION_IT: &str = "translation-it";
    /// `term - translation` lines with newly learned words
    pub const WORDS: &str = "words";
}

/// Typed decomposition of one model reply.
///
/// Absent sections and sections that are blank after trimming are both `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAssistantReply {
    /// Corrected sentence
    pub corrected: Option<String>,
    /// Explanation of the mistakes
    pub explanation: Option<String>,
    /// More natural phrasing
    pub alternative: Option<String>,
    /// Ukrainian translation
    pub translation_ua: Option<String>,
    /// Italian translation
    pub translation_it: Option<String>,
    /// Newly identified terms mapped to their translations
    pub words: Option<BTreeMap<String, String>>,
}

impl ParsedAssistantReply {
    /// Words section, or an empty map when the reply had none
    #[must_use]
    pub fn words_or_empty(&self) -> BTreeMap<String, String> {
        self.words.clone().unwrap_or_default()
    }
}

/// Parse a raw model reply.
///
/// Returns `None` ("nothing to say") when the reply is the `-` sentinel or
/// contains no marker line at all.
///
/// # Examples
///
/// ```
/// use oxide_lingo_core::parser::parse_reply;
///
/// let reply = parse_reply("::corrected::\nCiao!\n::words::\nciao - привіт").unwrap();
/// assert_eq!(reply.corrected.as_deref(), Some("Ciao!"));
/// assert_eq!(reply.words.unwrap()["ciao"], "привіт");
///
/// assert!(parse_reply("-").is_none());
/// ```
#[must_use]
pub fn parse_reply(raw: &str) -> Option<ParsedAssistantReply> {
    if raw.trim() == NOTHING_TO_SAY {
        return None;
    }

    let sections = split_sections(raw)?;
    let field = |label: &str| {
        sections
            .get(label)
            .filter(|body| !body.is_empty())
            .cloned()
    };

    Some(ParsedAssistantReply {
        corrected: field(labels::CORRECTED),
        explanation: field(labels::EXPLANATION),
        alternative: field(labels::ALTERNATIVE),
        translation_ua: field(labels::TRANSLATION_UA),
        translation_it: field(labels::TRANSLATION_IT),
        words: field(labels::WORDS).map(|body| parse_words(&body)),
    })
}

/// Split a reply into `label -> trimmed body`.
///
/// Labels are lower-cased. Returns `None` when no marker line was found. A
/// label repeated later in the reply overwrites the earlier body.
#[must_use]
pub fn split_sections(raw: &str) -> Option<HashMap<String, String>> {
    let marker = regex!(r"^::(\w[\w-]*)::\s*$");

    let mut sections = HashMap::new();
    let mut current: Option<String> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if let Some(caps) = marker.captures(line) {
            if let Some(label) = current.take() {
                sections.insert(label, buffer.join("\n").trim().to_string());
            }
            buffer.clear();
            current = Some(caps[1].to_lowercase());
        } else {
            buffer.push(line);
        }
    }

    if let Some(label) = current {
        sections.insert(label, buffer.join("\n").trim().to_string());
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections)
    }
}

/// Parse `term - translation` lines.
///
/// Each line is split on the first `-`; lines without two non-blank parts are
/// skipped.
#[must_use]
pub fn parse_words(body: &str) -> BTreeMap<String, String> {
    body.lines()
        .filter_map(|line| {
            let (term, translation) = line.split_once('-')?;
            let (term, translation) = (term.trim(), translation.trim());
            (!term.is_empty() && !translation.is_empty())
                .then(|| (term.to_string(), translation.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_sections() {
        let raw = "::corrected::\nX\n::explanation::\nY\n::words::\na - b\nc - d";
        let reply = parse_reply(raw).expect("markers present");

        assert_eq!(reply.corrected.as_deref(), Some("X"));
        assert_eq!(reply.explanation.as_deref(), Some("Y"));
        assert_eq!(reply.alternative, None);
        assert_eq!(reply.translation_ua, None);
        assert_eq!(reply.translation_it, None);

        let words = reply.words.expect("words section");
        assert_eq!(words.len(), 2);
        assert_eq!(words["a"], "b");
        assert_eq!(words["c"], "d");
    }

    #[test]
    fn test_sentinel_is_empty() {
        assert_eq!(parse_reply("-"), None);
        assert_eq!(parse_reply("  -\n"), None);
    }

    #[test]
    fn test_no_markers_is_empty() {
        assert_eq!(parse_reply("Everything looks fine!"), None);
        assert_eq!(parse_reply(""), None);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let reply = parse_reply("::Translation-UA::\nПривіт").expect("marker");
        assert_eq!(reply.translation_ua.as_deref(), Some("Привіт"));
    }

    #[test]
    fn test_blank_section_is_absent() {
        let reply = parse_reply("::corrected::\n\n   \n::translation-it::\nCiao").expect("markers");
        assert_eq!(reply.corrected, None);
        assert_eq!(reply.translation_it.as_deref(), Some("Ciao"));
    }

    #[test]
    fn test_only_blank_sections_is_not_empty_result() {
        let reply = parse_reply("::corrected::\n").expect("marker found");
        assert_eq!(reply, ParsedAssistantReply::default());
    }

    #[test]
    fn test_body_keeps_inner_blank_lines() {
        let reply =
            parse_reply("::explanation::\n\nFirst line\n\nSecond line\n\n").expect("marker");
        assert_eq!(
            reply.explanation.as_deref(),
            Some("First line\n\nSecond line")
        );
    }

    #[test]
    fn test_unknown_labels_are_ignored() {
        let sections = split_sections("::mood::\nhappy\n::corrected::\nOk").expect("markers");
        assert_eq!(sections["mood"], "happy");

        let reply = parse_reply("::mood::\nhappy").expect("marker");
        assert_eq!(reply, ParsedAssistantReply::default());
    }

    #[test]
    fn test_text_before_first_marker_is_dropped() {
        let reply = parse_reply("Sure, here you go:\n::corrected::\nCiao").expect("marker");
        assert_eq!(reply.corrected.as_deref(), Some("Ciao"));
    }

    #[test]
    fn test_marker_must_be_alone_on_line() {
        assert_eq!(parse_reply("text ::corrected:: more"), None);
        assert!(parse_reply("::corrected::   \nfine").is_some());
    }

    #[test]
    fn test_words_tolerant_parse() {
        let words = parse_words("appassita - зів'яла\nmalformed\n - nothing\nkey - \n\nfare - робити - діяти");
        assert_eq!(words.len(), 2);
        assert_eq!(words["appassita"], "зів'яла");
        // Split happens on the first dash only
        assert_eq!(words["fare"], "робити - діяти");
    }

    #[test]
    fn test_crlf_lines() {
        let reply = parse_reply("::corrected::\r\nCiao\r\n::words::\r\nciao - привіт\r\n")
            .expect("markers");
        assert_eq!(reply.corrected.as_deref(), Some("Ciao"));
        assert_eq!(reply.words_or_empty()["ciao"], "привіт");
    }
}
