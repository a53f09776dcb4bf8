/// Inline keyboard callbacks (review navigation, refresh, discard words)
pub mod callbacks;
/// Command and text message handlers
pub mod handlers;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// View layer for UI components (keyboards, messages)
pub mod views;
