//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Kite Connect Credentials ===
    /// Kite Connect API key.
    pub kite_api_key: String,

    /// Kite Connect API secret (used for the session checksum).
    pub kite_api_secret: String,

    /// Kite API base URL.
    #[serde(default = "default_kite_api_url")]
    pub kite_api_url: String,

    // === Trading Parameters ===
    /// Rupee budget used to size orders when no explicit quantity is given.
    #[serde(default = "default_invest_amount")]
    pub invest_amount: Decimal,

    /// Shared secret the confirm endpoint requires.
    #[serde(default = "default_confirm_token")]
    pub auto_confirm_token: String,

    // === Exit Engine ===
    /// Seconds between watcher evaluation passes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum age of a price observation before it is treated as stale.
    #[serde(default = "default_price_max_age")]
    pub price_max_age_secs: i64,

    // === Server Configuration ===
    /// OAuth redirect URL registered with the Kite app.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,

    /// Public base URL of this app (used by the sidecar; informational here).
    #[serde(default)]
    pub app_url: Option<String>,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Maximum retained entries per journal (trade log / error log).
    #[serde(default = "default_journal_cap")]
    pub journal_cap: usize,
}

fn default_kite_api_url() -> String {
    "https://api.kite.trade".to_string()
}

fn default_invest_amount() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_confirm_token() -> String {
    "changeme".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_price_max_age() -> i64 {
    30
}

fn default_redirect_url() -> String {
    "http://localhost:8080/login/callback".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.kite_api_key.is_empty() {
            return Err("KITE_API_KEY is required".to_string());
        }

        if self.kite_api_secret.is_empty() {
            return Err("KITE_API_SECRET is required".to_string());
        }

        if self.invest_amount <= Decimal::ZERO {
            return Err("INVEST_AMOUNT must be positive".to_string());
        }

        if self.auto_confirm_token.is_empty() {
            return Err("AUTO_CONFIRM_TOKEN must not be empty".to_string());
        }

        if self.poll_interval_secs == 0 {
            return Err("POLL_INTERVAL_SECS must be at least 1".to_string());
        }

        if self.price_max_age_secs <= 0 {
            return Err("PRICE_MAX_AGE_SECS must be positive".to_string());
        }

        url::Url::parse(&self.redirect_url)
            .map_err(|e| format!("REDIRECT_URL is not a valid URL: {}", e))?;

        Ok(())
    }

    /// Whether the confirm token is still the shipped placeholder.
    pub fn has_placeholder_token(&self) -> bool {
        self.auto_confirm_token == default_confirm_token()
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            kite_api_key: "test-key".to_string(),
            kite_api_secret: "test-secret".to_string(),
            kite_api_url: default_kite_api_url(),
            invest_amount: default_invest_amount(),
            auto_confirm_token: "test-token".to_string(),
            poll_interval_secs: default_poll_interval(),
            price_max_age_secs: default_price_max_age(),
            redirect_url: default_redirect_url(),
            app_url: None,
            port: default_port(),
            rust_log: default_log_level(),
            journal_cap: default_journal_cap(),
        }
    }
}

fn default_journal_cap() -> usize {
    1000
}
