use std::time::Duration;

use tracing::warn;

/// Base URL of the Kilo API (device authorization, organizations, ...).
pub const DEFAULT_API_BASE: &str = "https://api.kilo.ai";

/// Path of the OpenRouter-compatible model gateway, relative to the API base.
pub const OPENROUTER_PATH: &str = "/api/openrouter";

/// Suffix the gateway uses to mark models that are served without a paid key.
pub const DEFAULT_FREE_SUFFIX: &str = ":free";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints and tunables for talking to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub api_base: String,
    /// Default base URL for model requests and catalog sync.
    pub openrouter_base: String,
    /// Upper bound for a single catalog fetch.
    pub fetch_timeout: Duration,
    pub free_suffix: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            openrouter_base: format!("{DEFAULT_API_BASE}{OPENROUTER_PATH}"),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            free_suffix: DEFAULT_FREE_SUFFIX.into(),
        }
    }
}

impl GatewaySettings {
    /// Built-in defaults overridden by `KILO_API_BASE`, `KILO_OPENROUTER_BASE`
    /// and `KILO_FETCH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`GatewaySettings::from_env`] with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(api_base) = non_empty("KILO_API_BASE") {
            let api_base = api_base.trim().trim_end_matches('/').to_string();
            settings.openrouter_base = format!("{api_base}{OPENROUTER_PATH}");
            settings.api_base = api_base;
        }
        if let Some(base) = non_empty("KILO_OPENROUTER_BASE") {
            settings.openrouter_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = non_empty("KILO_FETCH_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.fetch_timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid KILO_FETCH_TIMEOUT_SECS"),
            }
        }
        settings
    }
}
