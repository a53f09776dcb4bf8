//! Assistant UI components
//!
//! Contains keyboards, callback data, text messages and HTML formatters.

use oxide_lingo_core::assistant::{AssistantError, ManualAddOutcome};
use oxide_lingo_core::export::ExportOutcome;
use oxide_lingo_core::parser::ParsedAssistantReply;
use oxide_lingo_core::storage::VocabularyEntry;
use std::collections::BTreeMap;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Callback data
// ─────────────────────────────────────────────────────────────────────────────

const REVIEW_PREFIX: &str = "review";
const REFRESH_PREFIX: &str = "refresh";
const DISCARD_WORDS_PREFIX: &str = "discard-words";

/// Movement inside the review sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMove {
    /// Show the following entry
    Next,
    /// Show the preceding entry
    Back,
    /// Delete the shown entry
    Delete,
}

impl ReviewMove {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Back => "back",
            Self::Delete => "delete",
        }
    }
}

/// Decoded inline keyboard action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Review card navigation
    Review {
        /// What to do
        movement: ReviewMove,
        /// Entry currently shown
        entry_id: Uuid,
    },
    /// Recompute the answer to a message
    Refresh {
        /// Message the answer replied to
        source_message_id: i32,
    },
    /// Take back the words an answer added
    DiscardWords {
        /// Message the answer replied to
        source_message_id: i32,
    },
}

impl CallbackAction {
    /// Decode callback data; unknown or malformed data yields `None`
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_lingo_transport_telegram::bot::views::CallbackAction;
    ///
    /// let action = CallbackAction::parse("refresh:42");
    /// assert_eq!(action, Some(CallbackAction::Refresh { source_message_id: 42 }));
    /// assert_eq!(CallbackAction::parse("refresh:abc"), None);
    /// ```
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let (prefix, rest) = data.split_once(':')?;
        match prefix {
            REVIEW_PREFIX => {
                let (movement, id) = rest.split_once(':')?;
                let movement = match movement {
                    "next" => ReviewMove::Next,
                    "back" => ReviewMove::Back,
                    "delete" => ReviewMove::Delete,
                    _ => return None,
                };
                let entry_id = Uuid::parse_str(id).ok()?;
                Some(Self::Review { movement, entry_id })
            }
            REFRESH_PREFIX => Some(Self::Refresh {
                source_message_id: rest.parse().ok()?,
            }),
            DISCARD_WORDS_PREFIX => Some(Self::DiscardWords {
                source_message_id: rest.parse().ok()?,
            }),
            _ => None,
        }
    }

    /// Encode as callback data
    #[must_use]
    pub fn to_data(&self) -> String {
        match self {
            Self::Review { movement, entry_id } => {
                format!("{REVIEW_PREFIX}:{}:{entry_id}", movement.as_str())
            }
            Self::Refresh { source_message_id } => {
                format!("{REFRESH_PREFIX}:{source_message_id}")
            }
            Self::DiscardWords { source_message_id } => {
                format!("{DISCARD_WORDS_PREFIX}:{source_message_id}")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Keyboard under an answer: refresh, plus "don't add" when words were saved
#[must_use]
pub fn answer_keyboard(source_message_id: i32, has_new_words: bool) -> InlineKeyboardMarkup {
    let mut row = vec![InlineKeyboardButton::callback(
        "🔄 Оновити",
        CallbackAction::Refresh { source_message_id }.to_data(),
    )];
    if has_new_words {
        row.push(InlineKeyboardButton::callback(
            "🚫 Не додавай слова",
            CallbackAction::DiscardWords { source_message_id }.to_data(),
        ));
    }
    InlineKeyboardMarkup::new(vec![row])
}

/// Keyboard under a review card
#[must_use]
pub fn review_keyboard(entry_id: Uuid) -> InlineKeyboardMarkup {
    let button = |label: &str, movement: ReviewMove| {
        InlineKeyboardButton::callback(
            label.to_string(),
            CallbackAction::Review { movement, entry_id }.to_data(),
        )
    };
    InlineKeyboardMarkup::new(vec![vec![
        button("⬅️ Назад", ReviewMove::Back),
        button("Видалити", ReviewMove::Delete),
        button("Далі ➡️", ReviewMove::Next),
    ]])
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for assistant UI view rendering
pub trait AssistantView {
    /// Help shown on `/start`
    fn welcome_message() -> &'static str;

    /// The user has no saved words
    fn no_words() -> &'static str;

    /// The daily request limit is used up
    fn too_many_requests() -> &'static str;

    /// The model could not answer
    fn model_unavailable() -> &'static str;

    /// The vocabulary could not be read or written
    fn storage_failure() -> &'static str;

    /// Someone pressed a button under another user's answer
    fn not_your_message() -> &'static str;

    /// The answer can no longer be refreshed
    fn answer_expired() -> &'static str;

    /// `/push` used by someone without access or without a configured deck
    fn export_unavailable() -> &'static str;

    /// User-facing text for an assistant failure
    fn assistant_error(error: &AssistantError) -> &'static str {
        match error {
            AssistantError::RateLimitExceeded { .. } => Self::too_many_requests(),
            AssistantError::ModelUnavailable(_) => Self::model_unavailable(),
            AssistantError::Persistence(_) => Self::storage_failure(),
        }
    }

    /// Render a structured answer
    fn answer(reply: &ParsedAssistantReply, new_words: &BTreeMap<String, String>) -> String;

    /// Render the grouped vocabulary listing
    fn vocabulary_list(words: &BTreeMap<String, Vec<String>>) -> String;

    /// Render one review card with the translation hidden
    fn review_card(entry: &VocabularyEntry) -> String;

    /// Render the result of a manual dictionary addition
    fn manual_add_result(outcome: &ManualAddOutcome) -> String;

    /// Render the result of a flashcard export
    fn export_result(outcome: ExportOutcome) -> String;

    /// The flashcard export failed
    fn export_failed() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default Ukrainian-language implementation of `AssistantView`
pub struct DefaultAssistantView;

impl AssistantView for DefaultAssistantView {
    fn welcome_message() -> &'static str {
        r"👋 <b>Привіт!</b>

Пиши мені італійською, і я виправлю помилки, поясню їх та збережу нові слова.
Напиши українською, і я перекладу на італійську.

Додати слова вручну: <code>casa :: дім</code> або просто <code>casa ::</code>, щоб я переклав сам.

/list показати збережені слова
/review повторити слова
/push відправити слова в Mochi Cards"
    }

    fn no_words() -> &'static str {
        "У вас ще немає збережених слів."
    }

    fn too_many_requests() -> &'static str {
        "⏳ Забагато запитів. На сьогодні все, повертайся завтра."
    }

    fn model_unavailable() -> &'static str {
        "⚠️ Не вдалося отримати відповідь. Спробуй трохи пізніше."
    }

    fn storage_failure() -> &'static str {
        "⚠️ Не вдалося зберегти словник. Спробуй ще раз."
    }

    fn not_your_message() -> &'static str {
        "Ці кнопки працюють тільки для автора повідомлення."
    }

    fn answer_expired() -> &'static str {
        "Цю відповідь вже не можна оновити."
    }

    fn export_unavailable() -> &'static str {
        "Я поки що цього не вмію."
    }

    fn answer(reply: &ParsedAssistantReply, new_words: &BTreeMap<String, String>) -> String {
        let sections = [
            ("✅ Правильний варіант", reply.corrected.as_deref().map(format_model_text)),
            ("ℹ️ Пояснення", reply.explanation.as_deref().map(format_model_text)),
            ("🎯 Альтернативний варіант", reply.alternative.as_deref().map(format_model_text)),
            ("🇺🇦 Переклад українською", reply.translation_ua.as_deref().map(format_model_text)),
            ("🇮🇹 Переклад італійською", reply.translation_it.as_deref().map(format_model_text)),
            ("✍️ Нові слова/фрази", (!new_words.is_empty()).then(|| word_lines(new_words))),
        ];

        sections
            .into_iter()
            .filter_map(|(title, body)| body.map(|body| format!("<b>{title}</b>\n{body}")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn vocabulary_list(words: &BTreeMap<String, Vec<String>>) -> String {
        if words.is_empty() {
            return Self::no_words().to_string();
        }
        words
            .iter()
            .map(|(key, values)| {
                format!(
                    "<b>{}</b> - {}",
                    html_escape::encode_text(key),
                    html_escape::encode_text(&values.join(", "))
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn review_card(entry: &VocabularyEntry) -> String {
        format!(
            "<b>{}</b> - <tg-spoiler>{}</tg-spoiler>",
            html_escape::encode_text(&entry.key),
            html_escape::encode_text(&entry.value)
        )
    }

    fn manual_add_result(outcome: &ManualAddOutcome) -> String {
        if outcome.inserted.is_empty() {
            "Нових слів не знайдено.".to_string()
        } else {
            format!("✍️ Записую:\n{}", word_lines(&outcome.inserted))
        }
    }

    fn export_result(outcome: ExportOutcome) -> String {
        match outcome {
            ExportOutcome::NothingToExport => {
                "У вас ще немає слів, щоб завантажити в Mochi Cards.".to_string()
            }
            ExportOutcome::Exported { saved, kept: 0 } => {
                format!("📤 Завантажено {saved} слів в Mochi Cards.")
            }
            ExportOutcome::Exported { saved, kept } => format!(
                "📤 Завантажено {saved} слів в Mochi Cards.\n⚠️ {kept} слів не прийнято, вони залишилися у вашому словнику."
            ),
        }
    }

    fn export_failed() -> &'static str {
        "⚠️ Не вдалося завантажити слова в Mochi Cards."
    }
}

/// Escape model text for HTML and turn `*marked*` fragments bold
#[must_use]
pub fn format_model_text(text: &str) -> String {
    let escaped = html_escape::encode_text(text.trim());
    lazy_regex::regex!(r"\*([^*\n]+)\*")
        .replace_all(&escaped, "<b>$1</b>")
        .into_owned()
}

fn word_lines(words: &BTreeMap<String, String>) -> String {
    words
        .iter()
        .map(|(key, value)| {
            format!(
                "<b>{}</b> - {}",
                html_escape::encode_text(key),
                html_escape::encode_text(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
