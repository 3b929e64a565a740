use std::path::Path;

use {
    anyhow::Result,
    kilo_config::{
        HostConfig, KILO_PROVIDER_ID, ModelCatalog, load_host_config_or_default, load_host_document,
        save_kilo_provider,
    },
    kilo_plugins::KiloGatewayPlugin,
    kilo_providers::{SuffixPolicy, catalog_http_client, fetch_models, filter_free},
    tracing::info,
};

use crate::{auth_commands::current_credential, credential_store::CredentialStore};

/// `kilo models`: list the gateway catalog, free-tier only unless `all`.
pub async fn list_models(plugin: &KiloGatewayPlugin, all: bool, json: bool) -> Result<()> {
    let store = CredentialStore::new();
    let credential = current_credential(plugin, &store).await?;
    let options = plugin.load_auth(&credential).await;

    let client = catalog_http_client(plugin.settings().fetch_timeout);
    let catalog = fetch_models(&client, &options).await?;
    let catalog = if all {
        catalog
    } else {
        filter_free(&catalog, &SuffixPolicy::new(plugin.settings().free_suffix.clone()))
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        print_catalog(&catalog);
    }
    Ok(())
}

fn print_catalog(catalog: &ModelCatalog) {
    if catalog.is_empty() {
        println!("No models available.");
        return;
    }
    let width = catalog.keys().map(str::len).max().unwrap_or(0);
    for (id, entry) in catalog.iter() {
        let context = entry
            .extra
            .get("limit")
            .and_then(|l| l.get("context"))
            .and_then(serde_json::Value::as_u64)
            .map(|c| format!("  ({c} ctx)"))
            .unwrap_or_default();
        println!(
            "{id:<width$}  {}{context}",
            entry.name.as_deref().unwrap_or("")
        );
    }
}

/// `kilo sync`: run the config hook against a host config file.
///
/// The hook sees the env-substituted config; only its `kilo` block is written
/// back, into the document as it was on disk.
pub async fn sync(plugin: &KiloGatewayPlugin, path: &Path, dry_run: bool) -> Result<()> {
    let mut config = load_host_config_or_default(path)?;
    plugin.config(&mut config).await;
    let synced = config.provider.remove(KILO_PROVIDER_ID).unwrap_or_default();

    if dry_run {
        let mut document = load_host_document(path)?;
        document
            .provider
            .entry(KILO_PROVIDER_ID.to_string())
            .or_default()
            .adopt_synced(synced);
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let document = save_kilo_provider(path, synced)?;
    let models = synced_model_count(&document);
    info!(path = %path.display(), models, "host config updated");
    println!("{models} Kilo models in {}", path.display());
    Ok(())
}

fn synced_model_count(document: &HostConfig) -> usize {
    document
        .kilo_provider()
        .map(|block| block.models.len())
        .unwrap_or_default()
}

/// `kilo options`: the request options the stored credential resolves to.
pub async fn show_options(plugin: &KiloGatewayPlugin) -> Result<()> {
    let store = CredentialStore::new();
    let credential = current_credential(plugin, &store).await?;
    let options = plugin.load_auth(&credential).await;
    println!("{}", serde_json::to_string_pretty(&options.to_redacted_json())?);
    Ok(())
}
