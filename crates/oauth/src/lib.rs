//! Gateway credentials: the stored record shape, the OAuth device
//! authorization grant, and token refresh.

pub mod credential;
pub mod defaults;
pub mod device_flow;
pub mod error;
pub mod refresh;
pub mod token;
pub mod types;

pub use {
    credential::CredentialRecord,
    defaults::{builtin_oauth_config, load_oauth_config},
    device_flow::{
        DeviceAuthSession, DeviceAuthTransport, DeviceCodePresenter, DeviceCodeResponse,
        DeviceFlow, DeviceFlowOutcome, DeviceFlowState, HttpDeviceTransport, TokenPoll,
    },
    refresh::refresh_credential,
    types::{OAuthConfig, serialize_option_secret, serialize_secret},
};

pub use error::{Error, Result};
