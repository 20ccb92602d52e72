//! Configuration management

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub telephony: TelephonyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    /// Provider REST API base URL
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    /// Caller id presented on outbound legs
    pub caller_id: String,
    /// Public base URL the provider posts webhooks to
    pub public_base_url: String,
    /// Hold audio for parked customer legs
    pub hold_music_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            caller_id: String::new(),
            public_base_url: "http://localhost:5000".to_string(),
            hold_music_url: "http://twimlets.com/holdmusic?Bucket=com.twilio.music.classical"
                .to_string(),
        }
    }
}

impl Config {
    /// Load from an optional `dialdesk.toml` plus `DIALDESK_*` environment
    /// overrides (e.g. `DIALDESK_TELEPHONY__AUTH_TOKEN`)
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("dialdesk").required(false))
            .add_source(
                config::Environment::with_prefix("DIALDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Normalized public base URL without a trailing slash
    pub fn public_base_url(&self) -> String {
        self.telephony
            .public_base_url
            .trim_end_matches('/')
            .to_string()
    }
}
