//! Auth methods the plugin offers to the host.

use std::collections::BTreeMap;

use {
    kilo_oauth::{CredentialRecord, DeviceFlowOutcome},
    serde::{Deserialize, Serialize},
};

/// Input key the API-key method reads.
pub const API_KEY_INPUT: &str = "apiKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethodKind {
    /// Device authorization grant.
    OAuth,
    /// Static key typed by the user.
    Api,
}

impl AuthMethodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::Api => "api",
        }
    }
}

impl std::fmt::Display for AuthMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMethodKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oauth" | "device" => Ok(Self::OAuth),
            "api" | "api-key" | "apikey" => Ok(Self::Api),
            other => Err(crate::Error::message(format!("unknown auth method: {other}"))),
        }
    }
}

/// One entry of the host's auth-method picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthMethod {
    #[serde(rename = "type")]
    pub kind: AuthMethodKind,
    pub label: &'static str,
}

pub fn auth_methods() -> Vec<AuthMethod> {
    vec![
        AuthMethod {
            kind: AuthMethodKind::OAuth,
            label: "Kilo Gateway (Device Authorization)",
        },
        AuthMethod {
            kind: AuthMethodKind::Api,
            label: "Kilo Gateway (API Key)",
        },
    ]
}

/// Free-form inputs collected by the host before calling `authorize`.
pub type AuthorizeInputs = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Expired,
    Denied,
    Failed,
    Cancelled,
    MissingInput,
}

/// What `authorize` hands back to the host.
#[derive(Debug)]
pub enum AuthorizeResult {
    /// The host should store `credential` for the gateway provider.
    Success { credential: CredentialRecord },
    Failed {
        kind: FailureKind,
        reason: Option<String>,
    },
}

impl AuthorizeResult {
    pub fn failed(kind: FailureKind) -> Self {
        Self::Failed { kind, reason: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn credential(&self) -> Option<&CredentialRecord> {
        match self {
            Self::Success { credential } => Some(credential),
            Self::Failed { .. } => None,
        }
    }
}

impl From<DeviceFlowOutcome> for AuthorizeResult {
    fn from(outcome: DeviceFlowOutcome) -> Self {
        match outcome {
            DeviceFlowOutcome::Succeeded(credential) => Self::Success { credential },
            DeviceFlowOutcome::Expired => Self::failed(FailureKind::Expired),
            DeviceFlowOutcome::Denied => Self::failed(FailureKind::Denied),
            DeviceFlowOutcome::Cancelled => Self::failed(FailureKind::Cancelled),
            DeviceFlowOutcome::Failed(reason) => Self::Failed {
                kind: FailureKind::Failed,
                reason: Some(reason),
            },
        }
    }
}

/// The API-key method: a trimmed, non-empty `apiKey` input becomes an
/// [`CredentialRecord::ApiKey`].
pub fn authorize_api_key(inputs: &AuthorizeInputs) -> AuthorizeResult {
    match inputs.get(API_KEY_INPUT).map(|k| k.trim()) {
        Some(key) if !key.is_empty() => AuthorizeResult::Success {
            credential: CredentialRecord::api_key(key),
        },
        _ => AuthorizeResult::failed(FailureKind::MissingInput),
    }
}
