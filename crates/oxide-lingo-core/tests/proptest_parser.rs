use oxide_lingo_core::parser::{parse_reply, parse_words};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parser_never_panics(raw in "\\PC*") {
        let _ = parse_reply(&raw);
    }

    #[test]
    fn text_without_markers_is_empty(raw in "[^:]*") {
        prop_assert!(parse_reply(&raw).is_none());
    }

    #[test]
    fn parsed_words_are_trimmed_and_non_blank(body in "([a-z ]{0,8}-?[a-z ]{0,8}\n){0,6}") {
        for (key, value) in parse_words(&body) {
            prop_assert!(!key.is_empty() && !value.is_empty());
            prop_assert_eq!(key.trim(), key.as_str());
            prop_assert_eq!(value.trim(), value.as_str());
        }
    }

    #[test]
    fn corrected_section_round_trips(body in "[a-zA-Z][a-zA-Z ,.!?]{0,40}[a-zA-Z.!?]") {
        let raw = format!("::corrected::\n{body}\n");
        let reply = parse_reply(&raw).expect("marker present");
        prop_assert_eq!(reply.corrected.as_deref(), Some(body.as_str()));
    }
}
