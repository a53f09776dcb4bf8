use dotenvy::dotenv;
use oxide_lingo_core::config::AssistantSettings;
use oxide_lingo_core::{
    assistant::LanguageAssistant,
    export::{FlashcardSync, MochiClient},
    llm::OpenAiModelService,
    rate_limit::RateLimiter,
    response_cache::ResponseCache,
    storage::{FileRecordStore, VocabularyStore},
};
use oxide_lingo_transport_telegram::bot::handlers::ExportService;
use oxide_lingo_transport_telegram::config::{BotSettings, TelegramSettings};
use oxide_lingo_transport_telegram::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    api_key: Regex,
    auth_header: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            api_key: Regex::new(r"sk-[A-Za-z0-9_-]{16,}")?,
            auth_header: Regex::new(r"(?i)(authorization:\s*(?:basic|bearer)\s+)[^\s,]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self.api_key.replace_all(&output, "[API_KEY]").to_string();
        output = self
            .auth_header
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Patterns must exist before the first log line is written.
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Oxide Lingo TG Bot...");

    let settings = init_settings();
    let (assistant, export) = init_services(&settings);

    run_bot(settings, assistant, export).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "oxide_lingo_core=info,oxide_lingo_transport_telegram=info,oxide_lingo_telegram_bot=info,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,async_openai=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let assistant_settings = match AssistantSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load assistant configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully.");
    Arc::new(BotSettings::new(assistant_settings, telegram_settings))
}

fn init_services(settings: &BotSettings) -> (Arc<LanguageAssistant>, ExportService) {
    let config = settings.assistant.as_ref();

    let model = match OpenAiModelService::from_settings(config) {
        Ok(model) => {
            info!("Model service initialized ({}).", model.model_id());
            model
        }
        Err(e) => {
            error!("Failed to initialize model service: {}", e);
            std::process::exit(1);
        }
    };

    let records = Arc::new(FileRecordStore::new(config.persistence_dir.clone()));
    info!("Vocabulary stored in {}", config.persistence_dir.display());
    let vocabulary = Arc::new(VocabularyStore::new(records));

    let limiter = Arc::new(RateLimiter::new(
        config.daily_request_limit,
        config.rate_limit_bypass_ids(),
        config.rate_limit_retention_days,
    ));

    let assistant = Arc::new(LanguageAssistant::new(
        vocabulary.clone(),
        Arc::new(ResponseCache::new()),
        limiter,
        Arc::new(model),
    ));

    let export = match (&config.mochi_api_key, &config.mochi_deck_id) {
        (Some(key), Some(deck)) if !key.is_empty() && !deck.is_empty() => {
            let exporter = Arc::new(MochiClient::new(key.clone()));
            Some(Arc::new(FlashcardSync::new(vocabulary, exporter, deck.clone())))
        }
        (Some(_), None) => {
            warn!("MOCHI_API_KEY is set but MOCHI_DECK_ID is missing; export disabled.");
            None
        }
        _ => None,
    };

    (assistant, export)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_secrets() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let line = "POST https://api.telegram.org/bot123456789:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA/sendMessage \
                    key=sk-abcdefghijklmnopqrstuvwxyz Authorization: Basic c2VjcmV0Og==";

        let redacted = patterns.redact(line);

        assert!(!redacted.contains("AAAAAAAAAAAAAAAA"));
        assert!(!redacted.contains("sk-abcdefghijklmnop"));
        assert!(!redacted.contains("c2VjcmV0Og=="));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
    }
}
