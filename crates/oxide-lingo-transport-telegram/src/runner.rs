use crate::bot;
use crate::bot::handlers::{get_user_id_safe, Command, ExportService};
use crate::config::BotSettings;
use oxide_lingo_core::assistant::LanguageAssistant;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(
    settings: Arc<BotSettings>,
    assistant: Arc<LanguageAssistant>,
    export: ExportService,
) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let handler = setup_handler();

    if export.is_some() {
        info!("Flashcard export enabled.");
    }
    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, assistant, export])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, settings: Arc<BotSettings>| {
                    settings.is_user_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_callback),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    is_sender_allowed(&msg, &settings)
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                )
                .branch(dptree::endpoint(handle_unsupported)),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<BotSettings>| {
                    !is_sender_allowed(&msg, &settings)
                })
                .endpoint(handle_unauthorized),
        )
}

fn is_sender_allowed(msg: &Message, settings: &BotSettings) -> bool {
    settings.is_user_allowed(get_user_id_safe(msg))
}

async fn handle_unauthorized(msg: Message) -> Result<(), teloxide::RequestError> {
    info!(
        "Ignoring message from user {} outside the allow list",
        get_user_id_safe(&msg)
    );
    respond(())
}

async fn handle_unsupported(msg: Message) -> Result<(), teloxide::RequestError> {
    debug!(
        "Ignoring non-text message {} from user {}",
        msg.id.0,
        get_user_id_safe(&msg)
    );
    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    assistant: Arc<LanguageAssistant>,
    export: ExportService,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::List => bot::handlers::list(bot, msg, assistant).await,
        Command::Review => bot::handlers::review(bot, msg, assistant).await,
        Command::Push => bot::handlers::push(bot, msg, export, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    assistant: Arc<LanguageAssistant>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, assistant).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    assistant: Arc<LanguageAssistant>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::callbacks::handle_callback(bot, q, assistant).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
