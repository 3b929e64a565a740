//! Host configuration types, gateway settings, and config file I/O.
//!
//! Host config files: `*.json`, `*.toml`, `*.yaml`.
//! Supports `${ENV_VAR}` and `{env:ENV_VAR}` substitution in all string values.

pub mod catalog;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod settings;

pub use {
    catalog::{ModelCatalog, ModelEntry},
    error::{Error, Result},
    loader::{
        clear_config_dir, config_dir, kilo_config_dir, load_host_config,
        load_host_config_or_default, load_host_document, save_host_config, save_kilo_provider,
        set_config_dir,
    },
    schema::{HostConfig, KILO_PROVIDER_ID, KILO_PROVIDER_NAME, ProviderBlock},
    settings::GatewaySettings,
};
