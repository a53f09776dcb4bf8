//! Telegram transport settings.

use config::ConfigError;
use oxide_lingo_core::config::{parse_id_list, AssistantSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Comma-separated list of user IDs allowed to use the bot.
    /// Empty means everyone.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Assistant settings shared across transport handlers.
    pub assistant: Arc<AssistantSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    allowed_users: Arc<HashSet<i64>>,
    export_allowed_ids: Arc<HashSet<i64>>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(assistant: AssistantSettings, telegram: TelegramSettings) -> Self {
        let allowed_users = telegram.allowed_users();
        let export_allowed_ids = assistant.export_allowed_ids();
        Self {
            assistant: Arc::new(assistant),
            telegram: Arc::new(telegram),
            allowed_users: Arc::new(allowed_users),
            export_allowed_ids: Arc::new(export_allowed_ids),
        }
    }

    /// Whether `user_id` may talk to the bot at all
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }

    /// Whether `user_id` may push words to flashcards
    #[must_use]
    pub fn is_export_allowed(&self, user_id: i64) -> bool {
        self.export_allowed_ids.contains(&user_id)
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        oxide_lingo_core::config::build_config()?.try_deserialize()
    }

    /// Returns the set of user IDs allowed to use the bot.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        parse_id_list(self.allowed_users_str.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(allowed: Option<&str>, export: Option<&str>) -> BotSettings {
        let assistant = AssistantSettings {
            export_allowed_ids_str: export.map(str::to_string),
            ..AssistantSettings::default()
        };
        let telegram = TelegramSettings {
            telegram_token: "dummy".to_string(),
            allowed_users_str: allowed.map(str::to_string),
        };
        BotSettings::new(assistant, telegram)
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let settings = settings(None, None);
        assert!(settings.is_user_allowed(1));
        assert!(!settings.is_export_allowed(1));
    }

    #[test]
    fn test_allow_lists() {
        let settings = settings(Some("123; 456"), Some("456"));
        assert!(settings.is_user_allowed(123));
        assert!(!settings.is_user_allowed(789));
        assert!(settings.is_export_allowed(456));
        assert!(!settings.is_export_allowed(123));
    }
}
