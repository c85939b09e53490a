//! Vendor client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Yandex API configuration shared by both clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexConfig {
    /// OAuth bearer credential (MVP single-tenant credential store).
    #[serde(default)]
    pub oauth_token: String,
    /// OAuth application id (authorization-code flow).
    #[serde(default)]
    pub client_id: String,
    /// OAuth application secret.
    #[serde(default)]
    pub client_secret: String,
    /// OAuth scopes; empty uses the scopes from app registration.
    #[serde(default)]
    pub oauth_scopes: String,
    /// Default project currency.
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Use the Direct sandbox environment.
    #[serde(default)]
    pub direct_sandbox: bool,
    /// Per-request deadline in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_currency() -> String {
    "RUB".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for YandexConfig {
    fn default() -> Self {
        Self {
            oauth_token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            oauth_scopes: String::new(),
            default_currency: default_currency(),
            direct_sandbox: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl YandexConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
