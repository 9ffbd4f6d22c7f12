//! Application configuration loaded from environment variables.

use std::time::Duration;

use selection::OrchestratorConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `"json"` for JSON log lines, anything else for text
/// - `CART_API_URL` — booking backend base URL; unset runs the in-memory backend
/// - `CART_API_TIMEOUT_SECS` — per-request upstream timeout (default: `30`)
/// - `CART_LOCALE` — locale for cart consistency reads (default: `"en"`)
/// - `RETURN_LEG_BACKOFF_MS` — pause before retrying a return leg (default: `600`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub cart_api_url: Option<String>,
    pub cart_api_timeout: Duration,
    pub cart_locale: String,
    pub return_leg_backoff: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            cart_api_url: get("CART_API_URL").filter(|url| !url.trim().is_empty()),
            cart_api_timeout: get("CART_API_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cart_api_timeout),
            cart_locale: get("CART_LOCALE").unwrap_or(defaults.cart_locale),
            return_leg_backoff: get("RETURN_LEG_BACKOFF_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.return_leg_backoff),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Orchestrator tuning derived from this config.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            locale: self.cart_locale.clone(),
            return_leg_backoff: self.return_leg_backoff,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            cart_api_url: None,
            cart_api_timeout: selection::services::http::DEFAULT_TIMEOUT,
            cart_locale: orchestrator.locale,
            return_leg_backoff: orchestrator.return_leg_backoff,
        }
    }
}
