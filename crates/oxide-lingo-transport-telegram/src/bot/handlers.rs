use crate::bot::resilient::{react_safe, send_html_resilient};
use crate::bot::views::{answer_keyboard, review_keyboard, AssistantView, DefaultAssistantView};
use crate::config::BotSettings;
use anyhow::Result;
use oxide_lingo_core::assistant::{AssistanceOutcome, AssistantError, LanguageAssistant};
use oxide_lingo_core::dictionary_input::DictionaryInput;
use oxide_lingo_core::export::FlashcardSync;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{error, info, warn};

// Bot API reactions are bare code points, without U+FE0F.

/// Reaction for messages with nothing to correct
pub const HEART_REACTION: &str = "\u{2764}";
/// Reaction for manual additions that needed no translation
pub const NOTED_REACTION: &str = "\u{270d}";

/// Flashcard export, present only when a deck is configured
pub type ExportService = Option<Arc<FlashcardSync>>;

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the help message
    #[command(description = "Show help.")]
    Start,
    /// List saved words
    #[command(description = "List saved words.")]
    List,
    /// Review saved words one by one
    #[command(description = "Review saved words.")]
    Review,
    /// Push saved words to flashcards
    #[command(description = "Push words to Mochi Cards.")]
    Push,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!("User {} initiated /start command.", get_user_id_safe(&msg));
    send_html_resilient(
        &bot,
        msg.chat.id,
        DefaultAssistantView::welcome_message(),
        None,
        None,
    )
    .await?;
    Ok(())
}

/// `/list`: grouped listing of the user's words
///
/// # Errors
///
/// Returns an error if the vocabulary cannot be read or the reply fails.
pub async fn list(bot: Bot, msg: Message, assistant: Arc<LanguageAssistant>) -> Result<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let words = assistant
        .vocabulary()
        .find_all(get_user_id_safe(&msg))
        .await?;
    send_html_resilient(
        &bot,
        msg.chat.id,
        &DefaultAssistantView::vocabulary_list(&words),
        Some(msg.id),
        None,
    )
    .await?;
    Ok(())
}

/// `/review`: first card of the review sequence
///
/// # Errors
///
/// Returns an error if the vocabulary cannot be read or the reply fails.
pub async fn review(bot: Bot, msg: Message, assistant: Arc<LanguageAssistant>) -> Result<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let entries = assistant
        .vocabulary()
        .find_all_entries(get_user_id_safe(&msg))
        .await?;

    match entries.first() {
        None => {
            send_html_resilient(
                &bot,
                msg.chat.id,
                DefaultAssistantView::no_words(),
                Some(msg.id),
                None,
            )
            .await?;
        }
        Some(entry) => {
            send_html_resilient(
                &bot,
                msg.chat.id,
                &DefaultAssistantView::review_card(entry),
                None,
                Some(review_keyboard(entry.id)),
            )
            .await?;
        }
    }
    Ok(())
}

/// `/push`: export the user's words to the flashcard deck
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn push(
    bot: Bot,
    msg: Message,
    export: ExportService,
    settings: Arc<BotSettings>,
) -> Result<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let user_id = get_user_id_safe(&msg);

    let text = match export {
        Some(sync) if settings.is_export_allowed(user_id) => match sync.push(user_id).await {
            Ok(outcome) => DefaultAssistantView::export_result(outcome),
            Err(e) => {
                error!("Export failed for user {user_id}: {e}");
                DefaultAssistantView::export_failed().to_string()
            }
        },
        _ => {
            info!("User {user_id} requested an export that is not available to them");
            DefaultAssistantView::export_unavailable().to_string()
        }
    };

    send_html_resilient(&bot, msg.chat.id, &text, Some(msg.id), None).await?;
    Ok(())
}

/// Plain text: manual dictionary input or analysis
///
/// # Errors
///
/// Returns an error if a Telegram call fails after retries.
pub async fn handle_text(bot: Bot, msg: Message, assistant: Arc<LanguageAssistant>) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if DictionaryInput::is_dictionary_input(text) {
        add_to_dictionary(&bot, &msg, &assistant, text).await
    } else {
        analyze(&bot, &msg, &assistant, text).await
    }
}

async fn analyze(bot: &Bot, msg: &Message, assistant: &LanguageAssistant, text: &str) -> Result<()> {
    let user_id = get_user_id_safe(msg);
    let outcome = assistant
        .handle(msg.chat.id.0, user_id, i64::from(msg.id.0), text)
        .await;

    match outcome {
        Ok(AssistanceOutcome::Reply { parsed, new_words }) => {
            let rendered = DefaultAssistantView::answer(&parsed, &new_words);
            if rendered.is_empty() {
                react_safe(bot, msg.chat.id, msg.id, HEART_REACTION).await;
                return Ok(());
            }
            send_html_resilient(
                bot,
                msg.chat.id,
                &rendered,
                Some(msg.id),
                Some(answer_keyboard(msg.id.0, !new_words.is_empty())),
            )
            .await?;
        }
        Ok(AssistanceOutcome::Empty) => {
            react_safe(bot, msg.chat.id, msg.id, HEART_REACTION).await;
        }
        Err(e) => reply_with_error(bot, msg, &e).await?,
    }
    Ok(())
}

async fn add_to_dictionary(
    bot: &Bot,
    msg: &Message,
    assistant: &LanguageAssistant,
    text: &str,
) -> Result<()> {
    let user_id = get_user_id_safe(msg);
    let input = DictionaryInput::parse(text);

    match assistant.add_entries(user_id, &input).await {
        Ok(outcome) if !outcome.translated => {
            react_safe(bot, msg.chat.id, msg.id, NOTED_REACTION).await;
        }
        Ok(outcome) => {
            send_html_resilient(
                bot,
                msg.chat.id,
                &DefaultAssistantView::manual_add_result(&outcome),
                Some(msg.id),
                None,
            )
            .await?;
        }
        Err(e) => reply_with_error(bot, msg, &e).await?,
    }
    Ok(())
}

/// Reply to `msg` with the user-facing text for `error`
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn reply_with_error(bot: &Bot, msg: &Message, error: &AssistantError) -> Result<()> {
    if let AssistantError::Persistence(e) = error {
        error!("Vocabulary storage failed: {e}");
    } else {
        warn!("Request from user {} failed: {error}", get_user_id_safe(msg));
    }
    let text = DefaultAssistantView::assistant_error(error);
    send_html_resilient(bot, msg.chat.id, text, Some(msg.id), None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactions_have_no_variation_selector() {
        for reaction in [HEART_REACTION, NOTED_REACTION] {
            assert_eq!(reaction.chars().count(), 1);
            assert!(!reaction.contains('\u{fe0f}'));
        }
    }
}
