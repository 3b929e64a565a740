use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::{HostConfig, KILO_PROVIDER_ID, ProviderBlock},
};

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the config directory for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Drop a previous [`set_config_dir`] override.
pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = None;
    }
}

/// Returns the kilo config directory.
///
/// Resolution order:
/// 1. programmatic override (`set_config_dir`)
/// 2. `KILO_CONFIG_DIR`
/// 3. `~/.config/kilo`
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .read()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(dir);
    }
    if let Ok(dir) = std::env::var("KILO_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "kilo").map(|d| d.config_dir().to_path_buf())
}

/// Config directory, falling back to a relative `.config/kilo`.
pub fn kilo_config_dir() -> PathBuf {
    config_dir().unwrap_or_else(|| PathBuf::from(".config/kilo"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
    Yaml,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    match ext {
        "json" => Ok(Format::Json),
        "toml" => Ok(Format::Toml),
        "yaml" | "yml" => Ok(Format::Yaml),
        other => Err(Error::unsupported_format(path, other)),
    }
}

/// Load a host config file (`.json`, `.toml`, `.yaml`) with env substitution.
pub fn load_host_config(path: &Path) -> Result<HostConfig> {
    let format = format_of(path)?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    debug!(path = %path.display(), "loaded host config");
    parse_host_config(&raw, format)
}

/// Like [`load_host_config`], but a missing file yields an empty config.
pub fn load_host_config_or_default(path: &Path) -> Result<HostConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "host config not found, starting empty");
        format_of(path)?;
        return Ok(HostConfig::default());
    }
    load_host_config(path)
}

/// Read a host config file as written, without env substitution.
///
/// This is the document to write back after a sync, so `{env:…}`
/// placeholders never turn into plaintext values on disk. A missing file
/// yields an empty config.
pub fn load_host_document(path: &Path) -> Result<HostConfig> {
    let format = format_of(path)?;
    if !path.exists() {
        return Ok(HostConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_host_config(&raw, format)
}

/// Store a synced `kilo` provider block into the file at `path`.
///
/// Only the `kilo` entry changes. Other providers and top-level keys are
/// written back exactly as they were parsed from disk. Returns the document
/// that was written.
pub fn save_kilo_provider(path: &Path, synced: ProviderBlock) -> Result<HostConfig> {
    let mut document = load_host_document(path)?;
    document
        .provider
        .entry(KILO_PROVIDER_ID.to_string())
        .or_default()
        .adopt_synced(synced);
    save_host_config(path, &document)?;
    Ok(document)
}

fn parse_host_config(raw: &str, format: Format) -> Result<HostConfig> {
    Ok(match format {
        Format::Json => serde_json::from_str(raw)?,
        Format::Toml => toml::from_str(raw)?,
        Format::Yaml => serde_yaml::from_str(raw)?,
    })
}

/// Write `config` back to `path` in the format implied by its extension.
///
/// Creates parent directories if needed.
pub fn save_host_config(path: &Path, config: &HostConfig) -> Result<()> {
    let format = format_of(path)?;
    let data = match format {
        Format::Json => serde_json::to_string_pretty(config)?,
        Format::Toml => toml::to_string_pretty(config)?,
        Format::Yaml => serde_yaml::to_string(config)?,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    debug!(path = %path.display(), "saved host config");
    Ok(())
}
