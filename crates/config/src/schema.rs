//! Host configuration schema.
//!
//! Only the parts this plugin reads or writes are typed. Everything else in
//! the host document is kept in `extra` maps so a load/save cycle does not
//! drop settings owned by the host or by other providers.

use std::collections::BTreeMap;

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::catalog::ModelCatalog;

/// Provider id under which the gateway block lives in host config.
pub const KILO_PROVIDER_ID: &str = "kilo";

/// Display name used when the host has not named the provider block.
pub const KILO_PROVIDER_NAME: &str = "Kilo Gateway";

/// Top-level host configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider: BTreeMap<String, ProviderBlock>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The portion of host config describing one model-serving backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "ModelCatalog::is_empty")]
    pub models: ModelCatalog,
    /// Ordered list of model ids exposed to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
    /// Connection options (`baseURL`, headers, ...). Kept untyped because the
    /// host accepts arbitrary keys here.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderBlock {
    /// User-authored `options.baseURL`, ignored unless it is a string.
    pub fn base_url_override(&self) -> Option<&str> {
        self.options.get("baseURL").and_then(Value::as_str)
    }

    /// Take the synced model list from `synced` while keeping this block's
    /// own text for everything else.
    ///
    /// `self` is the block as written on disk (placeholders intact) and
    /// `synced` the env-substituted block after a sync. Models this block
    /// already lists keep their on-disk entry; a missing name is filled in.
    pub fn adopt_synced(&mut self, synced: ProviderBlock) {
        let mut on_disk = std::mem::take(&mut self.models);
        self.models = synced
            .models
            .into_iter()
            .map(|(id, entry)| {
                let entry = on_disk.remove(&id).unwrap_or(entry);
                (id, entry)
            })
            .collect();
        self.whitelist = synced.whitelist;
        if self.name.is_none() {
            self.name = synced.name;
        }
    }
}

impl HostConfig {
    pub fn kilo_provider(&self) -> Option<&ProviderBlock> {
        self.provider.get(KILO_PROVIDER_ID)
    }
}
