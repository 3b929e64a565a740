//! Per-request connection options derived from the stored credential.

use std::collections::BTreeMap;

use {
    kilo_oauth::CredentialRecord,
    reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::warn,
};

pub const REFERER_HEADER: &str = "HTTP-Referer";
pub const REFERER_VALUE: &str = "https://kilo.ai";
pub const TITLE_HEADER: &str = "X-Title";
pub const TITLE_VALUE: &str = "Kilo Gateway";

/// Scopes an OAuth token to one organization.
pub const ORGANIZATION_HEADER: &str = "X-KiloCode-OrganizationId";

/// Ready-to-use connection parameters for one downstream gateway call.
#[derive(Clone)]
pub struct RequestOptions {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub api_key: Option<Secret<String>>,
}

impl RequestOptions {
    /// The unauthenticated template: base URL plus client identification headers.
    pub fn base(base_url: impl Into<String>) -> Self {
        let headers = BTreeMap::from([
            (REFERER_HEADER.to_string(), REFERER_VALUE.to_string()),
            (TITLE_HEADER.to_string(), TITLE_VALUE.to_string()),
        ]);
        Self {
            base_url: base_url.into(),
            headers,
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Secret<String>) -> Self {
        self.api_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.headers.get(ORGANIZATION_HEADER).map(String::as_str)
    }

    /// Headers for an HTTP request, including `Authorization: Bearer` when an
    /// API key is set. Header names or values that are not valid HTTP are
    /// skipped.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                },
                _ => warn!(header = %name, "skipping invalid request header"),
            }
        }
        if let Some(key) = &self.api_key
            && let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
        {
            value.set_sensitive(true);
            map.insert(AUTHORIZATION, value);
        }
        map
    }

    /// JSON view for display, with the API key masked.
    pub fn to_redacted_json(&self) -> Value {
        json!({
            "baseURL": self.base_url,
            "headers": self.headers,
            "apiKey": self.api_key.as_ref().map(|key| mask(key.expose_secret())),
        })
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "****".into()
    } else {
        format!("****{tail}")
    }
}

/// Compute request options for `credential`.
///
/// Never fails: a record that carries nothing usable yields the
/// unauthenticated template, which still reaches free-tier models.
pub fn resolve(credential: &CredentialRecord, default_base_url: &str) -> RequestOptions {
    let base = RequestOptions::base(default_base_url);
    match credential {
        CredentialRecord::None => base,
        CredentialRecord::ApiKey { key } => base.with_api_key(key.clone()),
        CredentialRecord::OAuth {
            access, account_id, ..
        } => {
            let options = base.with_api_key(access.clone());
            match account_id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => options.with_header(ORGANIZATION_HEADER, id),
                _ => options,
            }
        },
    }
}
