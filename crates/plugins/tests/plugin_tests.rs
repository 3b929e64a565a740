#![allow(clippy::unwrap_used, clippy::expect_used)]
use {
    kilo_config::{GatewaySettings, HostConfig},
    kilo_oauth::{DeviceAuthSession, DeviceCodePresenter, builtin_oauth_config},
    kilo_plugins::{
        API_KEY_INPUT, AuthMethodKind, AuthorizeInputs, AuthorizeResult, KiloGatewayPlugin,
    },
    std::sync::Mutex,
    tokio_util::sync::CancellationToken,
};

#[derive(Default)]
struct CapturingPresenter(Mutex<Option<String>>);

impl DeviceCodePresenter for CapturingPresenter {
    fn present(&self, session: &DeviceAuthSession) {
        *self.0.lock().unwrap() = Some(session.user_code.clone());
    }
}

fn plugin_for(server: &mockito::Server) -> KiloGatewayPlugin {
    let settings = GatewaySettings {
        api_base: server.url(),
        openrouter_base: format!("{}/api/openrouter", server.url()),
        ..GatewaySettings::default()
    };
    let oauth = builtin_oauth_config(&settings);
    KiloGatewayPlugin::new(settings).with_oauth_config(oauth)
}

#[tokio::test]
async fn config_hook_syncs_free_models_over_http() {
    let mut server = mockito::Server::new_async().await;
    let models = server
        .mock("GET", "/api/openrouter/models")
        .match_header("x-title", "Kilo Gateway")
        .match_header("http-referer", "https://kilo.ai")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data":[{"id":"paid/model","name":"Paid"},{"id":"qwen/qwen3-coder:free","name":"Qwen3 Coder"}]}"#,
        )
        .create_async()
        .await;

    let plugin = plugin_for(&server);
    let mut config = HostConfig::default();
    plugin.config(&mut config).await;

    models.assert_async().await;
    let kilo = config.kilo_provider().unwrap();
    assert_eq!(kilo.whitelist.as_deref().unwrap(), ["qwen/qwen3-coder:free"]);
    assert_eq!(
        kilo.models.get("qwen/qwen3-coder:free").unwrap().name.as_deref(),
        Some("Qwen3 Coder")
    );
}

#[tokio::test]
async fn device_login_then_load_auth() {
    let mut server = mockito::Server::new_async().await;
    let _code = server
        .mock("POST", "/api/oauth/device/code")
        .match_header("x-title", "Kilo Gateway")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"device_code":"dc","user_code":"KILO-9","verification_uri":"https://kilo.ai/device","interval":0,"expires_in":60}"#,
        )
        .create_async()
        .await;
    let _token = server
        .mock("POST", "/api/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at_live","organization_id":"org_77"}"#)
        .create_async()
        .await;

    let plugin = plugin_for(&server);
    let presenter = CapturingPresenter::default();
    let result = plugin
        .authorize(
            AuthMethodKind::OAuth,
            &AuthorizeInputs::new(),
            &presenter,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(presenter.0.lock().unwrap().as_deref(), Some("KILO-9"));
    let AuthorizeResult::Success { credential } = result else {
        panic!("expected device login to succeed");
    };
    let options = plugin.load_auth(&credential).await;
    let headers = options.header_map();
    assert_eq!(headers["authorization"], "Bearer at_live");
    assert_eq!(headers["x-kilocode-organizationid"], "org_77");
    assert_eq!(options.base_url, format!("{}/api/openrouter", server.url()));
}

#[tokio::test]
async fn api_key_login_then_load_auth() {
    let server = mockito::Server::new_async().await;
    let plugin = plugin_for(&server);
    let inputs = AuthorizeInputs::from([(API_KEY_INPUT.to_string(), "sk-kilo-1".to_string())]);
    let result = plugin
        .authorize(
            AuthMethodKind::Api,
            &inputs,
            &CapturingPresenter::default(),
            &CancellationToken::new(),
        )
        .await;
    let credential = result.credential().unwrap().clone();
    let options = plugin.load_auth(&credential).await;
    assert_eq!(options.header_map()["authorization"], "Bearer sk-kilo-1");
    assert!(options.organization_id().is_none());
}
