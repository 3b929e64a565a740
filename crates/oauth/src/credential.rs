use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use crate::types::{serialize_option_secret, serialize_secret};

/// Refresh this long before the recorded expiry to absorb clock skew.
pub const EXPIRY_SKEW_SECS: u64 = 5 * 60;

/// A credential as stored by the host's auth storage.
///
/// The wire shape is tagged by `type` (`"api"`, `"oauth"`). Any tag this
/// crate does not know deserializes to [`CredentialRecord::None`], so an
/// unrecognised record degrades to unauthenticated requests instead of an
/// error.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialRecord {
    #[serde(rename = "api")]
    ApiKey {
        #[serde(serialize_with = "serialize_secret")]
        key: Secret<String>,
    },
    #[serde(rename = "oauth")]
    OAuth {
        #[serde(serialize_with = "serialize_secret")]
        access: Secret<String>,
        #[serde(
            default,
            serialize_with = "serialize_option_secret",
            skip_serializing_if = "Option::is_none"
        )]
        refresh: Option<Secret<String>>,
        /// Unix timestamp (seconds) when the access token expires.
        #[serde(
            default,
            rename = "expiresAt",
            skip_serializing_if = "Option::is_none"
        )]
        expires_at: Option<u64>,
        /// Organization the token is scoped to.
        #[serde(default, rename = "accountId", skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
    },
    /// No credential. Also the landing spot for unknown tags.
    #[default]
    #[serde(rename = "none", other)]
    None,
}

impl CredentialRecord {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey {
            key: Secret::new(key.into()),
        }
    }

    pub fn oauth(access: impl Into<String>) -> Self {
        Self::OAuth {
            access: Secret::new(access.into()),
            refresh: None,
            expires_at: None,
            account_id: None,
        }
    }

    /// Attach an organization id. No-op for non-OAuth records.
    #[must_use]
    pub fn with_account_id(mut self, id: impl Into<String>) -> Self {
        if let Self::OAuth { account_id, .. } = &mut self {
            *account_id = Some(id.into());
        }
        self
    }

    /// Wire tag of the active variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey { .. } => "api",
            Self::OAuth { .. } => "oauth",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True when an OAuth token is past (or within the skew window of) its
    /// expiry at `now` (unix seconds). Records without an expiry never expire.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self {
            Self::OAuth {
                expires_at: Some(expires_at),
                ..
            } => now.saturating_add(EXPIRY_SKEW_SECS) >= *expires_at,
            _ => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Whether the record is expired and carries a refresh token.
    pub fn can_refresh(&self) -> bool {
        matches!(self, Self::OAuth { refresh: Some(_), .. }) && self.is_expired()
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey { .. } => f.debug_struct("ApiKey").field("key", &"[REDACTED]").finish(),
            Self::OAuth {
                refresh,
                expires_at,
                account_id,
                ..
            } => f
                .debug_struct("OAuth")
                .field("access", &"[REDACTED]")
                .field("refresh", &refresh.as_ref().map(|_| "[REDACTED]"))
                .field("expires_at", expires_at)
                .field("account_id", account_id)
                .finish(),
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
