//! Merging the gateway's model catalog into the host's `kilo` provider block.

use {
    kilo_config::{KILO_PROVIDER_NAME, ModelCatalog, ProviderBlock},
    tracing::info,
};

use crate::{
    catalog::ModelCatalogSource,
    free_tier::{FreeTierPolicy, filter_free},
};

/// Receives the one user-facing line a sync produces.
pub trait SyncLogger: Send + Sync {
    fn info(&self, message: &str);
}

/// Forwards sync messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl SyncLogger for TracingLogger {
    fn info(&self, message: &str) {
        info!(target: "kilo::sync", "{message}");
    }
}

/// Entries of `fetched` not present in `existing` (in fetched order), then
/// every entry of `existing` (in existing order).
pub fn merge_catalogs(fetched: &ModelCatalog, existing: &ModelCatalog) -> ModelCatalog {
    fetched
        .iter()
        .filter(|(id, _)| !existing.contains_key(id))
        .chain(existing.iter())
        .map(|(id, entry)| (id.to_string(), entry.clone()))
        .collect()
}

/// Compute the new `kilo` provider block from the previous one.
///
/// Only free-tier models survive, from both the existing block and the fetch.
/// User-authored entries win over fetched ones with the same id. When the
/// gateway returns nothing usable the existing free models are kept as they
/// are. Logs the size of the unfiltered catalog whenever the gateway returned
/// anything. Never fails.
pub async fn reconcile(
    existing: Option<&ProviderBlock>,
    source: &dyn ModelCatalogSource,
    policy: &dyn FreeTierPolicy,
    logger: &dyn SyncLogger,
) -> ProviderBlock {
    let mut block = existing.cloned().unwrap_or_default();
    let existing_free = filter_free(&block.models, policy);

    let base_url = block
        .base_url_override()
        .unwrap_or_else(|| source.default_base_url())
        .to_string();
    let fetched = source.fetch(Some(&base_url)).await;
    let fetched_free = filter_free(&fetched, policy);

    let models = if fetched_free.is_empty() {
        existing_free
    } else {
        merge_catalogs(&fetched_free, &existing_free)
    };

    block.whitelist = Some(models.keys().map(ToString::to_string).collect());
    block.models = models;
    if block.name.is_none() {
        block.name = Some(KILO_PROVIDER_NAME.into());
    }

    if !fetched.is_empty() {
        logger.info(&format!("Synced {} models from Kilo", fetched.len()));
    }
    block
}
