//! Configuration keys used by the bot.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::distconf::{Distconf, Variable};

/// Key names as they appear in every source.
pub mod keys {
    pub const BOT_TOKEN: &str = "BotToken";
    pub const API_BASE_URL: &str = "ApiBaseUrl";
    pub const REFRESH_INTERVAL: &str = "RefreshInterval";
    pub const DEBUG: &str = "Debug";
    pub const STATUS_MAX_RETRIES: &str = "StatusMaxRetries";
    pub const CHAT_POLICY: &str = "ChatPolicy";
}

/// How the bot behaves in group chats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPolicy {
    /// Remove the previous status message before posting a new one.
    pub delete_previous_status: bool,

    /// Chats allowed to issue commands. Empty means every chat.
    pub allowed_chats: Vec<i64>,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            delete_previous_status: true,
            allowed_chats: Vec::new(),
        }
    }
}

impl ChatPolicy {
    pub fn allows(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }
}

/// Live handles for every bot setting.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram HTTP API bot token.
    pub bot_token: Arc<Variable<String>>,

    /// Base URL of the game stats API.
    pub api_base_url: Arc<Variable<String>>,

    /// Poll interval for sources that cannot push changes.
    pub refresh_interval: Arc<Variable<Duration>>,

    /// Verbose transport logging.
    pub debug: Arc<Variable<bool>>,

    /// Attempts at fetching stats before giving up on a status request.
    pub status_max_retries: Arc<Variable<i64>>,

    pub chat_policy: Arc<Variable<ChatPolicy>>,
}

impl AppConfig {
    /// Register every key with its default.
    pub fn register(conf: &Distconf) -> Self {
        Self {
            bot_token: conf.string(keys::BOT_TOKEN, "invalid:token"),
            api_base_url: conf.string(keys::API_BASE_URL, "http://127.0.0.1/"),
            refresh_interval: conf.duration(keys::REFRESH_INTERVAL, Duration::from_secs(30)),
            debug: conf.bool(keys::DEBUG, false),
            status_max_retries: conf.int(keys::STATUS_MAX_RETRIES, 3),
            chat_policy: conf.structured(keys::CHAT_POLICY, ChatPolicy::default()),
        }
    }

    /// True while the token is still the placeholder default.
    pub fn has_placeholder_token(&self) -> bool {
        self.bot_token.get() == *self.bot_token.default_value()
    }
}
