//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the assistant's constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Prefix for assistant environment variables (`AI_LANG_ASSISTANT_MODEL_ID`, ...)
pub const ENV_PREFIX: &str = "AI_LANG_ASSISTANT";

/// Default number of model-backed requests a subject may make per day
pub const DEFAULT_DAILY_REQUEST_LIMIT: u32 = 100;
/// Default number of days rate-limit counters are kept
pub const DEFAULT_RATE_LIMIT_RETENTION_DAYS: u32 = 2;
/// Default chat model
pub const DEFAULT_MODEL_ID: &str = "gpt-4o";
/// Default OpenAI-compatible endpoint
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default completion cap
pub const DEFAULT_MODEL_MAX_TOKENS: u32 = 2048;
/// Default sampling temperature
pub const DEFAULT_MODEL_TEMPERATURE: f32 = 0.2;
/// Default directory for per-user vocabulary files
pub const DEFAULT_PERSISTENCE_DIR: &str = "data/vocabulary";
/// Mochi Cards API base URL
pub const MOCHI_API_BASE: &str = "https://app.mochi.cards/api";
/// Page size used when listing existing Mochi cards
pub const MOCHI_PAGE_LIMIT: u32 = 100;

// Transport retry configuration
/// Maximum attempts for retried transport operations
pub const TRANSPORT_MAX_RETRIES: usize = 3;
/// Initial backoff for retried transport operations
pub const TRANSPORT_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for retried transport operations
pub const TRANSPORT_MAX_BACKOFF_MS: u64 = 4000;

/// Assistant settings shared by the core services
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssistantSettings {
    /// Directory holding one vocabulary file per user
    #[serde(default = "default_persistence_dir")]
    pub persistence_dir: PathBuf,

    /// API key of the OpenAI-compatible provider
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible provider
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    /// Chat model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Maximum completion tokens
    #[serde(default = "default_model_max_tokens")]
    pub model_max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_model_temperature")]
    pub model_temperature: f32,

    /// Requests allowed per subject per calendar day
    #[serde(default = "default_daily_request_limit")]
    pub daily_request_limit: u32,
    /// Comma-separated list of subject IDs exempt from the daily limit
    #[serde(rename = "rate_limit_bypass_ids")]
    pub rate_limit_bypass_ids_str: Option<String>,
    /// Days of rate-limit counters kept before they are swept
    #[serde(default = "default_rate_limit_retention_days")]
    pub rate_limit_retention_days: u32,

    /// Mochi Cards API key; export is disabled without it
    pub mochi_api_key: Option<String>,
    /// Mochi deck receiving exported words
    pub mochi_deck_id: Option<String>,
    /// Comma-separated list of user IDs allowed to export
    #[serde(rename = "export_allowed_ids")]
    pub export_allowed_ids_str: Option<String>,
}

fn default_persistence_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PERSISTENCE_DIR)
}

fn default_openai_api_base() -> String {
    DEFAULT_OPENAI_API_BASE.to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

const fn default_model_max_tokens() -> u32 {
    DEFAULT_MODEL_MAX_TOKENS
}

const fn default_model_temperature() -> f32 {
    DEFAULT_MODEL_TEMPERATURE
}

const fn default_daily_request_limit() -> u32 {
    DEFAULT_DAILY_REQUEST_LIMIT
}

const fn default_rate_limit_retention_days() -> u32 {
    DEFAULT_RATE_LIMIT_RETENTION_DAYS
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            persistence_dir: default_persistence_dir(),
            openai_api_key: None,
            openai_api_base: default_openai_api_base(),
            model_id: default_model_id(),
            model_max_tokens: DEFAULT_MODEL_MAX_TOKENS,
            model_temperature: DEFAULT_MODEL_TEMPERATURE,
            daily_request_limit: DEFAULT_DAILY_REQUEST_LIMIT,
            rate_limit_bypass_ids_str: None,
            rate_limit_retention_days: DEFAULT_RATE_LIMIT_RETENTION_DAYS,
            mochi_api_key: None,
            mochi_deck_id: None,
            export_allowed_ids_str: None,
        }
    }
}

/// Build the layered configuration source.
///
/// Precedence, lowest first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `AI_LANG_ASSISTANT_*` variables, un-prefixed variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .ignore_empty(true),
        )
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl AssistantSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_lingo_core::config::AssistantSettings;
    ///
    /// let settings = AssistantSettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Subject IDs that are never rate limited
    #[must_use]
    pub fn rate_limit_bypass_ids(&self) -> HashSet<i64> {
        parse_id_list(self.rate_limit_bypass_ids_str.as_deref())
    }

    /// User IDs allowed to push their vocabulary to flashcards
    #[must_use]
    pub fn export_allowed_ids(&self) -> HashSet<i64> {
        parse_id_list(self.export_allowed_ids_str.as_deref())
    }
}

/// Parse a list of numeric IDs separated by commas, semicolons or whitespace.
///
/// Tokens that are not valid integers are skipped.
///
/// # Examples
///
/// ```
/// use oxide_lingo_core::config::parse_id_list;
///
/// let ids = parse_id_list(Some("1, 2;abc 3"));
/// assert_eq!(ids.len(), 3);
/// ```
#[must_use]
pub fn parse_id_list(raw: Option<&str>) -> HashSet<i64> {
    raw.map(|s| {
        s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .filter_map(|id| id.parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_parsing() {
        // Comma
        let allowed = parse_id_list(Some("123,456"));
        assert!(allowed.contains(&123));
        assert!(allowed.contains(&456));
        assert_eq!(allowed.len(), 2);

        // Space
        let allowed = parse_id_list(Some("111 222"));
        assert_eq!(allowed.len(), 2);

        // Semicolon and mixed
        let allowed = parse_id_list(Some("333; 444, 555"));
        assert!(allowed.contains(&333));
        assert!(allowed.contains(&444));
        assert!(allowed.contains(&555));
        assert_eq!(allowed.len(), 3);

        // Bad tokens are skipped
        let allowed = parse_id_list(Some("abc, 777"));
        assert!(allowed.contains(&777));
        assert_eq!(allowed.len(), 1);

        assert!(parse_id_list(None).is_empty());
    }

    #[test]
    fn test_defaults() {
        let settings = AssistantSettings::default();
        assert_eq!(settings.daily_request_limit, 100);
        assert_eq!(settings.model_id, "gpt-4o");
        assert_eq!(settings.rate_limit_retention_days, 2);
        assert!(settings.rate_limit_bypass_ids().is_empty());
    }

    #[test]
    fn test_bypass_ids_from_settings() {
        let settings = AssistantSettings {
            rate_limit_bypass_ids_str: Some("228089372".to_string()),
            export_allowed_ids_str: Some("1 2".to_string()),
            ..AssistantSettings::default()
        };
        assert!(settings.rate_limit_bypass_ids().contains(&228_089_372));
        assert_eq!(settings.export_allowed_ids().len(), 2);
    }
}
