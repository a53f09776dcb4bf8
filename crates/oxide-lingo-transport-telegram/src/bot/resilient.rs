//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Every helper sends HTML and retries transient failures with exponential
//! backoff and jitter through
//! [`oxide_lingo_core::utils::retry_transport_operation`].

use anyhow::Result;
use lazy_regex::regex;
use oxide_lingo_core::utils::truncate_str;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode, ReactionType, ReplyParameters,
};
use tracing::{debug, warn};

/// Maximum message length for Telegram with safety margin.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Room left after a cut for the ellipsis and the closing tags
const CUT_RESERVE: usize = 64;

/// Cut HTML text to the Telegram limit, marking the cut.
///
/// A tag or entity split by the cut is dropped and tags left open are
/// closed, so the result still parses as Telegram HTML.
#[must_use]
pub fn fit_message(text: &str) -> String {
    if text.chars().count() <= TELEGRAM_MESSAGE_LIMIT {
        return text.to_string();
    }

    let mut cut = truncate_str(text, TELEGRAM_MESSAGE_LIMIT - CUT_RESERVE);
    for (open, close) in [('<', '>'), ('&', ';')] {
        if let Some(pos) = cut.rfind(open) {
            if !cut[pos..].contains(close) {
                cut.truncate(pos);
            }
        }
    }

    let mut open_tags: Vec<String> = Vec::new();
    for tag in regex!(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)[^>]*>").captures_iter(&cut) {
        if &tag[1] == "/" {
            if let Some(index) = open_tags.iter().rposition(|name| name == &tag[2]) {
                open_tags.truncate(index);
            }
        } else {
            open_tags.push(tag[2].to_string());
        }
    }

    cut.push('…');
    for name in open_tags.iter().rev() {
        cut.push_str("</");
        cut.push_str(name);
        cut.push('>');
    }
    cut
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Arguments
///
/// * `bot` - The Telegram bot instance
/// * `chat_id` - Target chat ID
/// * `text` - HTML text to send
/// * `reply_to` - Message to reply to, if any
/// * `keyboard` - Inline keyboard to attach, if any
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn send_html_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = fit_message(text);
    oxide_lingo_core::utils::retry_transport_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(id));
        }
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Replace the text and keyboard of a message.
///
/// "Not modified" counts as success.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn edit_html_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let text = fit_message(text);
    oxide_lingo_core::utils::retry_transport_operation(|| async {
        let mut req = bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        match req.await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => {
                debug!("Message update skipped: message is not modified");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Drop the inline keyboard of a message, ignoring failures.
pub async fn clear_keyboard_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = oxide_lingo_core::utils::retry_transport_operation(|| async {
        bot.edit_message_reply_markup(chat_id, msg_id)
            .reply_markup(InlineKeyboardMarkup::default())
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await;

    if let Err(e) = result {
        log_edit_failure(&e);
    }
}

/// Delete a message, ignoring failures.
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = oxide_lingo_core::utils::retry_transport_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await;

    if let Err(e) = result {
        warn!("Failed to delete message: {e}");
    }
}

/// React to a message with an emoji, ignoring failures.
pub async fn react_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId, emoji: &str) {
    let result = oxide_lingo_core::utils::retry_transport_operation(|| async {
        bot.set_message_reaction(chat_id, msg_id)
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram reaction error: {e}"))
    })
    .await;

    if let Err(e) = result {
        warn!("Failed to set reaction: {e}");
    }
}

fn log_edit_failure(error: &anyhow::Error) {
    let err_msg = error.to_string();
    if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
        debug!("Message update skipped: {err_msg}");
    } else {
        warn!("Failed to edit message after retries: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_message_keeps_short_text() {
        assert_eq!(fit_message("ciao"), "ciao");
    }

    fn assert_balanced(html: &str) {
        let mut open: Vec<String> = Vec::new();
        for tag in regex!(r"<(/?)([a-z-]+)>").captures_iter(html) {
            if &tag[1] == "/" {
                assert_eq!(open.pop().as_deref(), Some(&tag[2]), "in {html:?}");
            } else {
                open.push(tag[2].to_string());
            }
        }
        assert!(open.is_empty(), "unclosed {open:?}");
        assert!(!html.contains('<') || html.rfind('<') < html.rfind('>'));
    }

    #[test]
    fn test_fit_message_cuts_long_text() {
        let long = "й".repeat(TELEGRAM_MESSAGE_LIMIT + 10);
        let fitted = fit_message(&long);
        assert!(fitted.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        assert!(fitted.ends_with('…'));
    }

    #[test]
    fn test_fit_message_drops_tag_split_by_the_cut() {
        let filler = "а".repeat(TELEGRAM_MESSAGE_LIMIT - CUT_RESERVE - 2);
        let html = format!("{filler}<b>✅ Правильний варіант</b>\nCiao");

        let fitted = fit_message(&format!("{html}{}", "x".repeat(200)));

        assert_eq!(fitted, format!("{filler}…"));
        assert_balanced(&fitted);
    }

    #[test]
    fn test_fit_message_closes_open_tags() {
        let html = format!(
            "<b>Пояснення</b>\n<tg-spoiler><b>{}</b></tg-spoiler>",
            "я".repeat(5000)
        );

        let fitted = fit_message(&html);

        assert!(fitted.ends_with("…</b></tg-spoiler>"));
        assert!(fitted.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        assert_balanced(&fitted);
    }

    #[test]
    fn test_fit_message_drops_entity_split_by_the_cut() {
        let filler = "б".repeat(TELEGRAM_MESSAGE_LIMIT - CUT_RESERVE - 2);
        let fitted = fit_message(&format!("{filler}&amp;{}", "x".repeat(200)));

        assert_eq!(fitted, format!("{filler}…"));
    }
}
