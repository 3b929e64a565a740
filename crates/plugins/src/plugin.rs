//! The gateway plugin as seen by the host.

use std::sync::Arc;

use {
    kilo_config::{GatewaySettings, HostConfig, KILO_PROVIDER_ID},
    kilo_oauth::{
        CredentialRecord, DeviceCodePresenter, DeviceFlow, HttpDeviceTransport, OAuthConfig,
        load_oauth_config,
    },
    kilo_providers::{
        FreeTierPolicy, HttpCatalogFetcher, ModelCatalogSource, RequestOptions, SuffixPolicy,
        SyncLogger, TracingLogger, catalog_http_client, reconcile, resolve, shared_http_client,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    accessor::CredentialAccessor,
    auth::{AuthMethod, AuthMethodKind, AuthorizeInputs, AuthorizeResult, auth_methods, authorize_api_key},
    transform::{ChatMessage, strip_reasoning},
};

/// Kilo Gateway integration: config sync, auth loading and the auth methods.
pub struct KiloGatewayPlugin {
    settings: GatewaySettings,
    oauth: OAuthConfig,
    client: reqwest::Client,
    catalog: Arc<dyn ModelCatalogSource>,
    policy: Arc<dyn FreeTierPolicy>,
    logger: Arc<dyn SyncLogger>,
}

impl KiloGatewayPlugin {
    pub fn new(settings: GatewaySettings) -> Self {
        let oauth = load_oauth_config(&settings);
        let catalog = HttpCatalogFetcher::new(
            catalog_http_client(settings.fetch_timeout),
            settings.openrouter_base.clone(),
        );
        Self {
            policy: Arc::new(SuffixPolicy::new(settings.free_suffix.clone())),
            catalog: Arc::new(catalog),
            logger: Arc::new(TracingLogger),
            client: shared_http_client().clone(),
            oauth,
            settings,
        }
    }

    /// Settings and OAuth endpoints taken from the environment.
    pub fn from_env() -> Self {
        Self::new(GatewaySettings::from_env())
    }

    #[must_use]
    pub fn with_catalog_source(mut self, catalog: Arc<dyn ModelCatalogSource>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_free_tier_policy(mut self, policy: Arc<dyn FreeTierPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn SyncLogger>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_oauth_config(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = oauth;
        self
    }

    pub fn provider_id(&self) -> &'static str {
        KILO_PROVIDER_ID
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn oauth_config(&self) -> &OAuthConfig {
        &self.oauth
    }

    /// Config hook: replace the `kilo` provider block with a synced one.
    /// Other providers and top-level keys are left alone.
    pub async fn config(&self, config: &mut HostConfig) {
        let block = reconcile(
            config.kilo_provider(),
            self.catalog.as_ref(),
            self.policy.as_ref(),
            self.logger.as_ref(),
        )
        .await;
        debug!(models = block.models.len(), "updated kilo provider block");
        config.provider.insert(KILO_PROVIDER_ID.to_string(), block);
    }

    /// Auth loader hook: request options for the stored credential.
    ///
    /// An accessor error is treated like an absent credential.
    pub async fn load_auth(&self, accessor: &dyn CredentialAccessor) -> RequestOptions {
        let credential = match accessor.credential().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "could not read stored credential, continuing unauthenticated");
                CredentialRecord::None
            },
        };
        debug!(kind = credential.kind(), "resolving request options");
        resolve(&credential, &self.settings.openrouter_base)
    }

    pub fn auth_methods(&self) -> Vec<AuthMethod> {
        auth_methods()
    }

    /// Run one auth method to completion. Never errors: failures are
    /// reported as [`AuthorizeResult::Failed`].
    pub async fn authorize(
        &self,
        method: AuthMethodKind,
        inputs: &AuthorizeInputs,
        presenter: &dyn DeviceCodePresenter,
        cancel: &CancellationToken,
    ) -> AuthorizeResult {
        match method {
            AuthMethodKind::Api => authorize_api_key(inputs),
            AuthMethodKind::OAuth => {
                let identification = RequestOptions::base(self.settings.api_base.as_str());
                let transport = HttpDeviceTransport::new(self.client.clone(), self.oauth.clone())
                    .with_headers(identification.header_map());
                let outcome = DeviceFlow::new(transport).run(presenter, cancel).await;
                info!(state = ?outcome.state(), "device authorization finished");
                outcome.into()
            },
        }
    }

    /// Message transform hook.
    pub fn transform_messages(&self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        strip_reasoning(messages)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Error, Result, auth::FailureKind},
        async_trait::async_trait,
        kilo_config::{ModelCatalog, ModelEntry, ProviderBlock},
        kilo_oauth::DeviceAuthSession,
        serde_json::json,
        std::sync::Mutex,
    };

    struct FixedCatalog(ModelCatalog);

    #[async_trait]
    impl ModelCatalogSource for FixedCatalog {
        fn default_base_url(&self) -> &str {
            "http://catalog.test"
        }

        async fn fetch(&self, _base_url: Option<&str>) -> ModelCatalog {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl SyncLogger for Lines {
        fn info(&self, message: &str) {
            self.0.lock().unwrap().push(message.into());
        }
    }

    struct NoPresenter;

    impl DeviceCodePresenter for NoPresenter {
        fn present(&self, _session: &DeviceAuthSession) {}
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialAccessor for BrokenStore {
        async fn credential(&self) -> Result<CredentialRecord> {
            Err(Error::message("disk on fire"))
        }
    }

    fn plugin(catalog: ModelCatalog) -> (KiloGatewayPlugin, Arc<Lines>) {
        let lines = Arc::new(Lines::default());
        let plugin = KiloGatewayPlugin::new(GatewaySettings::default())
            .with_catalog_source(Arc::new(FixedCatalog(catalog)))
            .with_logger(lines.clone());
        (plugin, lines)
    }

    fn free_catalog() -> ModelCatalog {
        [("a:free", "A"), ("b", "B"), ("c:free", "C")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), ModelEntry::new(id).with_name(name)))
            .collect()
    }

    #[tokio::test]
    async fn config_hook_writes_only_kilo_entry() {
        let (plugin, lines) = plugin(free_catalog());
        let mut config: HostConfig = serde_json::from_value(json!({
            "theme": "dark",
            "provider": {
                "openai": { "name": "OpenAI", "models": { "gpt-x": {} } }
            }
        }))
        .unwrap();
        let other_before = config.provider["openai"].clone();

        plugin.config(&mut config).await;

        assert_eq!(config.provider["openai"], other_before);
        assert_eq!(config.extra["theme"], "dark");
        let kilo = &config.provider["kilo"];
        assert_eq!(kilo.name.as_deref(), Some("Kilo Gateway"));
        assert_eq!(kilo.whitelist.as_deref().unwrap(), ["a:free", "c:free"]);
        assert_eq!(lines.0.lock().unwrap().as_slice(), ["Synced 3 models from Kilo"]);
    }

    #[tokio::test]
    async fn config_hook_keeps_user_block_when_catalog_empty() {
        let (plugin, lines) = plugin(ModelCatalog::new());
        let mut config = HostConfig::default();
        config.provider.insert("kilo".into(), ProviderBlock {
            name: Some("Team Kilo".into()),
            models: free_catalog(),
            ..ProviderBlock::default()
        });

        plugin.config(&mut config).await;

        let kilo = config.kilo_provider().unwrap();
        assert_eq!(kilo.name.as_deref(), Some("Team Kilo"));
        assert_eq!(kilo.models.keys().collect::<Vec<_>>(), vec!["a:free", "c:free"]);
        assert!(lines.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_auth_resolves_stored_credential() {
        let (plugin, _) = plugin(ModelCatalog::new());
        let stored = CredentialRecord::oauth("at").with_account_id("org_5");
        let options = plugin.load_auth(&stored).await;
        assert_eq!(options.base_url, "https://api.kilo.ai/api/openrouter");
        assert_eq!(options.organization_id(), Some("org_5"));
        assert!(options.api_key.is_some());
    }

    #[tokio::test]
    async fn load_auth_fails_open_on_accessor_error() {
        let (plugin, _) = plugin(ModelCatalog::new());
        let options = plugin.load_auth(&BrokenStore).await;
        assert!(options.api_key.is_none());
        assert_eq!(options.headers["X-Title"], "Kilo Gateway");
    }

    #[tokio::test]
    async fn api_key_method_without_input_fails() {
        let (plugin, _) = plugin(ModelCatalog::new());
        let result = plugin
            .authorize(
                AuthMethodKind::Api,
                &AuthorizeInputs::new(),
                &NoPresenter,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, AuthorizeResult::Failed {
            kind: FailureKind::MissingInput,
            ..
        }));
    }

    #[tokio::test]
    async fn cancelled_device_method_reports_cancelled() {
        let (plugin, _) = plugin(ModelCatalog::new());
        let plugin = plugin.with_oauth_config(OAuthConfig {
            client_id: "kilo-cli".into(),
            auth_url: "http://127.0.0.1:9/device".into(),
            token_url: "http://127.0.0.1:9/token".into(),
            scopes: vec![],
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = plugin
            .authorize(AuthMethodKind::OAuth, &AuthorizeInputs::new(), &NoPresenter, &cancel)
            .await;
        assert!(matches!(result, AuthorizeResult::Failed {
            kind: FailureKind::Cancelled,
            ..
        }));
    }

    #[test]
    fn transform_hook_strips_reasoning() {
        let (plugin, _) = plugin(ModelCatalog::new());
        let messages: Vec<ChatMessage> = serde_json::from_value(json!([
            { "role": "assistant", "parts": [{ "type": "reasoning" }, { "type": "text", "text": "x" }] }
        ]))
        .unwrap();
        let out = plugin.transform_messages(messages);
        assert_eq!(out[0].parts.as_ref().unwrap().len(), 1);
    }
}
