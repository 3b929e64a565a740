use std::{collections::HashMap, path::Path};

use {
    kilo_config::{GatewaySettings, KILO_PROVIDER_ID, kilo_config_dir},
    tracing::{debug, warn},
};

use crate::types::OAuthConfig;

/// Public client id registered for the device grant.
pub const DEFAULT_CLIENT_ID: &str = "kilo-cli";

/// Built-in device-grant endpoints, derived from the gateway API base.
pub fn builtin_oauth_config(settings: &GatewaySettings) -> OAuthConfig {
    let api_base = settings.api_base.trim_end_matches('/');
    OAuthConfig {
        client_id: DEFAULT_CLIENT_ID.into(),
        auth_url: format!("{api_base}/api/oauth/device/code"),
        token_url: format!("{api_base}/api/oauth/token"),
        scopes: vec![],
    }
}

/// Load the OAuth config for the gateway.
///
/// Priority:
/// 1. Environment variables (`KILO_OAUTH_CLIENT_ID`, `KILO_OAUTH_AUTH_URL`, `KILO_OAUTH_TOKEN_URL`)
/// 2. User config file (`~/.config/kilo/oauth_providers.json`, key `"kilo"`)
/// 3. Built-in defaults
pub fn load_oauth_config(settings: &GatewaySettings) -> OAuthConfig {
    let path = kilo_config_dir().join("oauth_providers.json");
    load_oauth_config_with(settings, Some(&path), |name| std::env::var(name).ok())
}

/// Same as [`load_oauth_config`] with an explicit file path and env lookup.
pub fn load_oauth_config_with(
    settings: &GatewaySettings,
    file: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> OAuthConfig {
    let mut config = builtin_oauth_config(settings);

    if let Some(path) = file
        && let Some(file_config) = read_file_config(path)
    {
        debug!(path = %path.display(), "using OAuth config from file");
        config = file_config;
    }

    let set = |target: &mut String, name: &str| {
        if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
            *target = value;
        }
    };
    set(&mut config.client_id, "KILO_OAUTH_CLIENT_ID");
    set(&mut config.auth_url, "KILO_OAUTH_AUTH_URL");
    set(&mut config.token_url, "KILO_OAUTH_TOKEN_URL");

    config
}

fn read_file_config(path: &Path) -> Option<OAuthConfig> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<HashMap<String, OAuthConfig>>(&data) {
        Ok(mut configs) => configs.remove(KILO_PROVIDER_ID),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable OAuth config file");
            None
        },
    }
}
