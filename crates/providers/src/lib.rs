//! Talking to the Kilo gateway: per-request options, the model catalog, the
//! free-tier policy, and the provider block reconciler.

pub mod catalog;
pub mod error;
pub mod free_tier;
pub mod options;
pub mod reconcile;

pub use {
    catalog::{HttpCatalogFetcher, ModelCatalogSource, fetch_models, parse_models_response},
    error::{Error, Result},
    free_tier::{FreeTierPolicy, SuffixPolicy, filter_free},
    options::{ORGANIZATION_HEADER, RequestOptions, resolve},
    reconcile::{SyncLogger, TracingLogger, merge_catalogs, reconcile},
};

/// Shared HTTP client for gateway calls.
///
/// Reuses one connection pool across catalog syncs and token requests.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> =
        std::sync::LazyLock::new(reqwest::Client::new);
    &CLIENT
}

/// HTTP client whose timeout bounds a single catalog fetch.
pub fn catalog_http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| shared_http_client().clone())
}
