//! Inline keyboard callbacks.
//!
//! Review cards are edited in place. Answer buttons act on the answer cache
//! and are reserved for the author of the message the answer replied to.

use crate::bot::resilient::{clear_keyboard_safe, delete_message_safe, edit_html_resilient};
use crate::bot::views::{
    answer_keyboard, review_keyboard, AssistantView, CallbackAction, DefaultAssistantView,
    ReviewMove,
};
use anyhow::Result;
use oxide_lingo_core::assistant::{AssistanceOutcome, LanguageAssistant, RefreshOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle a press on any of the bot's inline buttons.
///
/// # Errors
///
/// Returns an error if the vocabulary cannot be read or written, or if a
/// Telegram call fails after retries.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    assistant: Arc<LanguageAssistant>,
) -> Result<()> {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        debug!("Ignoring unknown callback data: {:?}", q.data);
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };
    let Some(message) = q.regular_message() else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    let chat_id = message.chat.id;
    let target = message.id;

    match action {
        CallbackAction::Review { movement, entry_id } => {
            let _ = bot.answer_callback_query(q.id.clone()).await;
            navigate(&bot, &assistant, user_id, chat_id, target, movement, entry_id).await
        }
        CallbackAction::Refresh { source_message_id }
        | CallbackAction::DiscardWords { source_message_id } => {
            let author = message
                .reply_to_message()
                .and_then(|source| source.from.as_ref())
                .map(|u| u.id.0.cast_signed());
            if author != Some(user_id) {
                info!("User {user_id} pressed a button under someone else's answer");
                alert(&bot, &q, DefaultAssistantView::not_your_message()).await;
                return Ok(());
            }

            let answer = AnswerRef {
                chat_id,
                user_id,
                source_message_id,
                target,
            };
            if matches!(action, CallbackAction::Refresh { .. }) {
                refresh(&bot, &q, &assistant, answer).await
            } else {
                discard_words(&bot, &q, &assistant, answer).await
            }
        }
    }
}

/// A rendered answer and the message it replied to
#[derive(Clone, Copy)]
struct AnswerRef {
    chat_id: ChatId,
    user_id: i64,
    source_message_id: i32,
    target: MessageId,
}

async fn navigate(
    bot: &Bot,
    assistant: &LanguageAssistant,
    user_id: i64,
    chat_id: ChatId,
    target: MessageId,
    movement: ReviewMove,
    entry_id: Uuid,
) -> Result<()> {
    let vocabulary = assistant.vocabulary();
    let shown = match movement {
        ReviewMove::Next => vocabulary.next(user_id, entry_id).await?,
        ReviewMove::Back => vocabulary.back(user_id, entry_id).await?,
        ReviewMove::Delete => vocabulary.delete(user_id, entry_id).await?,
    };

    match shown {
        Some(entry) => {
            edit_html_resilient(
                bot,
                chat_id,
                target,
                &DefaultAssistantView::review_card(&entry),
                Some(review_keyboard(entry.id)),
            )
            .await
        }
        None => {
            delete_message_safe(bot, chat_id, target).await;
            Ok(())
        }
    }
}

async fn refresh(
    bot: &Bot,
    q: &CallbackQuery,
    assistant: &LanguageAssistant,
    answer: AnswerRef,
) -> Result<()> {
    let outcome = assistant
        .refresh(
            answer.chat_id.0,
            answer.user_id,
            i64::from(answer.source_message_id),
        )
        .await;

    match outcome {
        Ok(RefreshOutcome::Expired) => expire(bot, q, answer).await,
        Ok(RefreshOutcome::Refreshed(AssistanceOutcome::Reply { parsed, new_words })) => {
            let _ = bot.answer_callback_query(q.id.clone()).await;
            let text = DefaultAssistantView::answer(&parsed, &new_words);
            if text.is_empty() {
                clear_keyboard_safe(bot, answer.chat_id, answer.target).await;
                return Ok(());
            }
            edit_html_resilient(
                bot,
                answer.chat_id,
                answer.target,
                &text,
                Some(answer_keyboard(
                    answer.source_message_id,
                    !new_words.is_empty(),
                )),
            )
            .await
        }
        Ok(RefreshOutcome::Refreshed(AssistanceOutcome::Empty)) => {
            // Nothing to say this time; the old text stays.
            let _ = bot.answer_callback_query(q.id.clone()).await;
            Ok(())
        }
        Err(e) => {
            warn!("Refresh failed for user {}: {e}", answer.user_id);
            alert(bot, q, DefaultAssistantView::assistant_error(&e)).await;
            Ok(())
        }
    }
}

async fn discard_words(
    bot: &Bot,
    q: &CallbackQuery,
    assistant: &LanguageAssistant,
    answer: AnswerRef,
) -> Result<()> {
    let updated = assistant
        .discard_new_words(
            answer.chat_id.0,
            answer.user_id,
            i64::from(answer.source_message_id),
        )
        .await;

    match updated {
        Ok(Some(cached)) => {
            let _ = bot.answer_callback_query(q.id.clone()).await;
            let text = DefaultAssistantView::answer(&cached.reply, &BTreeMap::new());
            if text.is_empty() {
                clear_keyboard_safe(bot, answer.chat_id, answer.target).await;
                return Ok(());
            }
            edit_html_resilient(
                bot,
                answer.chat_id,
                answer.target,
                &text,
                Some(answer_keyboard(answer.source_message_id, false)),
            )
            .await
        }
        Ok(None) => expire(bot, q, answer).await,
        Err(e) => {
            warn!("Discarding words failed for user {}: {e}", answer.user_id);
            alert(bot, q, DefaultAssistantView::storage_failure()).await;
            Ok(())
        }
    }
}

async fn expire(bot: &Bot, q: &CallbackQuery, answer: AnswerRef) -> Result<()> {
    alert(bot, q, DefaultAssistantView::answer_expired()).await;
    clear_keyboard_safe(bot, answer.chat_id, answer.target).await;
    Ok(())
}

async fn alert(bot: &Bot, q: &CallbackQuery, text: &str) {
    if let Err(e) = bot
        .answer_callback_query(q.id.clone())
        .text(text)
        .show_alert(true)
        .await
    {
        warn!("Failed to answer callback query: {e}");
    }
}
