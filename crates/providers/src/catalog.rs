//! Remote model catalog retrieval.

use {
    async_trait::async_trait,
    kilo_config::{ModelCatalog, ModelEntry},
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    options::RequestOptions,
};

/// Something that can list the models offered by the gateway.
///
/// Implementations never fail past this boundary: any problem yields an empty
/// catalog.
#[async_trait]
pub trait ModelCatalogSource: Send + Sync {
    /// Base URL used when the caller does not supply one.
    fn default_base_url(&self) -> &str;

    async fn fetch(&self, base_url: Option<&str>) -> ModelCatalog;
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<RemoteModel>,
}

#[derive(Debug, Deserialize)]
struct RemoteModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    top_provider: Option<TopProvider>,
    #[serde(default)]
    supported_parameters: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TopProvider {
    #[serde(default)]
    max_completion_tokens: Option<u64>,
}

impl RemoteModel {
    fn into_entry(self) -> ModelEntry {
        let mut entry = ModelEntry::new(self.id.clone());
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            entry = entry.with_name(name);
        }

        let output = self.top_provider.and_then(|p| p.max_completion_tokens);
        if self.context_length.is_some() || output.is_some() {
            let mut limit = serde_json::Map::new();
            if let Some(context) = self.context_length {
                limit.insert("context".into(), json!(context));
            }
            if let Some(output) = output {
                limit.insert("output".into(), json!(output));
            }
            entry = entry.with_field("limit", Value::Object(limit));
        }

        let supports = |param: &str| self.supported_parameters.iter().any(|p| p == param);
        if supports("tools") {
            entry = entry.with_field("tool_call", Value::Bool(true));
        }
        if supports("reasoning") || supports("include_reasoning") {
            entry = entry.with_field("reasoning", Value::Bool(true));
        }
        entry
    }
}

/// Parse a `{"data": [...]}` listing into a catalog keyed by model id.
///
/// Entries with an empty id are skipped; a repeated id keeps its first
/// position and the last payload.
pub fn parse_models_response(body: &Value) -> Result<ModelCatalog> {
    let response = ModelsResponse::deserialize(body)?;
    let mut catalog = ModelCatalog::new();
    for model in response.data {
        if model.id.trim().is_empty() {
            continue;
        }
        catalog.insert(model.id.clone(), model.into_entry());
    }
    Ok(catalog)
}

/// GET `{base_url}/models` with the given request options.
pub async fn fetch_models(client: &reqwest::Client, options: &RequestOptions) -> Result<ModelCatalog> {
    let url = format!("{}/models", options.base_url.trim_end_matches('/'));
    let resp = client
        .get(&url)
        .headers(options.header_map())
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| Error::external(format!("GET {url}"), e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::CatalogStatus {
            status: status.as_u16(),
        });
    }
    let body: Value = resp.json().await?;
    parse_models_response(&body)
}

/// [`ModelCatalogSource`] backed by the gateway's `/models` endpoint.
pub struct HttpCatalogFetcher {
    client: reqwest::Client,
    template: RequestOptions,
}

impl HttpCatalogFetcher {
    /// The client's own timeout bounds each fetch.
    pub fn new(client: reqwest::Client, default_base_url: impl Into<String>) -> Self {
        Self {
            client,
            template: RequestOptions::base(default_base_url),
        }
    }

    /// Use resolved credentials (and their base URL) for every fetch.
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.template = options;
        self
    }
}

#[async_trait]
impl ModelCatalogSource for HttpCatalogFetcher {
    fn default_base_url(&self) -> &str {
        &self.template.base_url
    }

    async fn fetch(&self, base_url: Option<&str>) -> ModelCatalog {
        let mut options = self.template.clone();
        if let Some(base_url) = base_url {
            options.base_url = base_url.to_string();
        }
        match fetch_models(&self.client, &options).await {
            Ok(catalog) => {
                debug!(count = catalog.len(), base_url = %options.base_url, "fetched model catalog");
                catalog
            },
            Err(e) => {
                debug!(base_url = %options.base_url, error = %e, "model catalog unavailable");
                ModelCatalog::new()
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Router, http::HeaderMap, routing::get},
        kilo_oauth::CredentialRecord,
        std::time::Duration,
    };

    async fn start_mock(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn listing() -> Value {
        json!({
            "data": [
                {
                    "id": "z-ai/glm-4.5-air:free",
                    "name": "GLM 4.5 Air (free)",
                    "context_length": 131072,
                    "top_provider": { "max_completion_tokens": 8192 },
                    "supported_parameters": ["tools", "reasoning", "temperature"]
                },
                { "id": "anthropic/claude-sonnet-4", "name": "Claude Sonnet 4" },
                { "id": "" }
            ]
        })
    }

    #[test]
    fn parses_listing_with_metadata() {
        let catalog = parse_models_response(&listing()).unwrap();
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec![
            "z-ai/glm-4.5-air:free",
            "anthropic/claude-sonnet-4"
        ]);
        let glm = catalog.get("z-ai/glm-4.5-air:free").unwrap();
        assert_eq!(glm.id, "z-ai/glm-4.5-air:free");
        assert_eq!(glm.name.as_deref(), Some("GLM 4.5 Air (free)"));
        assert_eq!(glm.extra["limit"], json!({ "context": 131072, "output": 8192 }));
        assert_eq!(glm.extra["tool_call"], true);
        assert_eq!(glm.extra["reasoning"], true);

        let sonnet = catalog.get("anthropic/claude-sonnet-4").unwrap();
        assert!(!sonnet.extra.contains_key("limit"));
        assert!(!sonnet.extra.contains_key("tool_call"));
    }

    #[test]
    fn missing_data_is_empty() {
        assert!(parse_models_response(&json!({})).unwrap().is_empty());
        assert!(parse_models_response(&json!({ "data": "nope" })).is_err());
    }

    #[tokio::test]
    async fn fetch_sends_identification_headers() {
        let app = Router::new().route(
            "/api/openrouter/models",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers["http-referer"], "https://kilo.ai");
                assert_eq!(headers["x-title"], "Kilo Gateway");
                assert!(!headers.contains_key("authorization"));
                axum::Json(listing())
            }),
        );
        let base = start_mock(app).await;
        let fetcher = HttpCatalogFetcher::new(reqwest::Client::new(), format!("{base}/api/openrouter"));
        let catalog = fetcher.fetch(None).await;
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn fetch_uses_override_and_credentials() {
        let app = Router::new().route(
            "/custom/models",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers["authorization"], "Bearer at_1");
                assert_eq!(headers["x-kilocode-organizationid"], "org_1");
                axum::Json(json!({ "data": [{ "id": "m:free" }] }))
            }),
        );
        let base = start_mock(app).await;
        let options = crate::options::resolve(
            &CredentialRecord::oauth("at_1").with_account_id("org_1"),
            "http://127.0.0.1:9/unused",
        );
        let fetcher = HttpCatalogFetcher::new(reqwest::Client::new(), "http://unused")
            .with_options(options);
        let catalog = fetcher.fetch(Some(&format!("{base}/custom/"))).await;
        assert!(catalog.contains_key("m:free"));
    }

    #[tokio::test]
    async fn http_error_yields_empty_catalog() {
        let app = Router::new().route(
            "/models",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = start_mock(app).await;
        let fetcher = HttpCatalogFetcher::new(reqwest::Client::new(), base.clone());
        assert!(fetcher.fetch(None).await.is_empty());

        let err = fetch_models(&reqwest::Client::new(), &RequestOptions::base(base))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CatalogStatus { status: 500 }));
    }

    #[tokio::test]
    async fn malformed_body_yields_empty_catalog() {
        let app = Router::new().route("/models", get(|| async { "not json" }));
        let base = start_mock(app).await;
        let fetcher = HttpCatalogFetcher::new(reqwest::Client::new(), base);
        assert!(fetcher.fetch(None).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_gateway_yields_empty_catalog() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let fetcher = HttpCatalogFetcher::new(client, "http://127.0.0.1:9");
        assert!(fetcher.fetch(None).await.is_empty());
    }

    #[tokio::test]
    async fn slow_gateway_hits_client_timeout() {
        let app = Router::new().route(
            "/models",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::Json(json!({ "data": [{ "id": "late:free" }] }))
            }),
        );
        let base = start_mock(app).await;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let fetcher = HttpCatalogFetcher::new(client, base);
        assert!(fetcher.fetch(None).await.is_empty());
    }
}
