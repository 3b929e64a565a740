//! Host-facing surface of the Kilo Gateway integration.
//!
//! The host drives [`KiloGatewayPlugin`] through four hooks: config sync,
//! auth loading, the auth-method registry, and the chat message transform.

pub mod accessor;
pub mod auth;
pub mod error;
pub mod plugin;
pub mod transform;

pub use {
    accessor::CredentialAccessor,
    auth::{
        API_KEY_INPUT, AuthMethod, AuthMethodKind, AuthorizeInputs, AuthorizeResult, FailureKind,
        auth_methods,
    },
    error::{Error, Result},
    plugin::KiloGatewayPlugin,
    transform::{ChatMessage, MessagePart, strip_reasoning},
};
