use std::{collections::BTreeMap, path::PathBuf};

use {
    anyhow::Result,
    async_trait::async_trait,
    kilo_config::{KILO_PROVIDER_ID, kilo_config_dir},
    kilo_oauth::CredentialRecord,
    kilo_plugins::CredentialAccessor,
    tracing::{debug, info, warn},
};

/// File-based credential storage at `~/.config/kilo/auth.json`, keyed by
/// provider id.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            path: kilo_config_dir().join("auth.json"),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_raw(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "credential file not found");
                Ok(None)
            },
            Err(e) => Err(e.into()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, CredentialRecord>> {
        match self.read_raw()? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_all(&self, map: &BTreeMap<String, CredentialRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// The gateway credential, `None` when nothing is stored.
    pub fn load(&self) -> Result<CredentialRecord> {
        let mut map = self.read_all()?;
        Ok(map.remove(KILO_PROVIDER_ID).unwrap_or_default())
    }

    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        info!(path = %self.path.display(), kind = record.kind(), "saving credential");
        // A file that is not valid JSON is replaced; I/O errors are not.
        let mut map = match self.read_raw()? {
            Some(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "discarding malformed credential file");
                BTreeMap::new()
            }),
            None => BTreeMap::new(),
        };
        map.insert(KILO_PROVIDER_ID.to_string(), record.clone());
        self.write_all(&map)
    }

    /// Remove the gateway credential. Returns whether one was stored.
    pub fn delete(&self) -> Result<bool> {
        let mut map = self.read_all()?;
        let removed = map.remove(KILO_PROVIDER_ID).is_some();
        if removed {
            self.write_all(&map)?;
            info!(path = %self.path.display(), "credential removed");
        }
        Ok(removed)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialAccessor for CredentialStore {
    async fn credential(&self) -> kilo_plugins::Result<CredentialRecord> {
        self.load()
            .map_err(|e| kilo_plugins::Error::message(format!("{}: {e:#}", self.path.display())))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::with_path(dir.path().join("nested").join("auth.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
        assert!(!store.delete().unwrap());
    }

    #[test]
    fn save_load_delete() {
        let (_dir, store) = temp_store();
        store
            .save(&CredentialRecord::oauth("at").with_account_id("org"))
            .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.kind(), "oauth");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["kilo"]["type"], "oauth");
        assert_eq!(raw["kilo"]["accountId"], "org");

        assert!(store.delete().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn other_providers_are_preserved() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"anthropic":{"type":"api","key":"sk-ant"}}"#,
        )
        .unwrap();
        store.save(&CredentialRecord::api_key("sk-kilo")).unwrap();
        store.delete().unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["anthropic"]["key"], "sk-ant");
        assert!(raw.get("kilo").is_none());
    }

    #[test]
    fn unknown_record_type_reads_as_none() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"kilo":{"type":"wellknown","token":"x"}}"#).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save(&CredentialRecord::api_key("k")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_replaces_malformed_file() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{broken").unwrap();
        store.save(&CredentialRecord::api_key("sk-kilo")).unwrap();
        assert_eq!(store.load().unwrap().kind(), "api");
    }

    #[test]
    fn save_propagates_read_errors() {
        let (_dir, store) = temp_store();
        // A directory at the credential path cannot be read as a file.
        std::fs::create_dir_all(store.path()).unwrap();
        std::fs::write(store.path().join("keep"), "x").unwrap();

        assert!(store.save(&CredentialRecord::api_key("sk-kilo")).is_err());
        assert!(store.path().is_dir());
        assert!(store.path().join("keep").exists());
    }

    #[tokio::test]
    async fn accessor_reports_unreadable_file() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{broken").unwrap();
        assert!(store.credential().await.is_err());
    }
}
