#![allow(clippy::unwrap_used, clippy::expect_used)]
use {
    kilo_config::GatewaySettings,
    kilo_oauth::{
        CredentialRecord, DeviceAuthSession, DeviceCodePresenter, DeviceFlow, DeviceFlowOutcome,
        DeviceFlowState, HttpDeviceTransport, OAuthConfig, builtin_oauth_config,
        refresh_credential,
    },
    secrecy::ExposeSecret,
    tokio_util::sync::CancellationToken,
};

struct Silent;

impl DeviceCodePresenter for Silent {
    fn present(&self, _session: &DeviceAuthSession) {}
}

fn config_for(server: &mockito::Server) -> OAuthConfig {
    let settings = GatewaySettings {
        api_base: server.url(),
        ..GatewaySettings::default()
    };
    builtin_oauth_config(&settings)
}

#[tokio::test]
async fn device_flow_against_builtin_endpoints() {
    let mut server = mockito::Server::new_async().await;
    let code = server
        .mock("POST", "/api/oauth/device/code")
        .match_body(mockito::Matcher::UrlEncoded(
            "client_id".into(),
            "kilo-cli".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"device_code":"dc","user_code":"KILO-1234","verification_uri":"https://kilo.ai/device","interval":0,"expires_in":60}"#,
        )
        .create_async()
        .await;
    let token = server
        .mock("POST", "/api/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,"organization_id":"org_1"}"#)
        .create_async()
        .await;

    let transport = HttpDeviceTransport::new(reqwest::Client::new(), config_for(&server));
    let mut flow = DeviceFlow::new(transport);
    let outcome = flow.run(&Silent, &CancellationToken::new()).await;

    code.assert_async().await;
    token.assert_async().await;
    assert_eq!(flow.state(), DeviceFlowState::Succeeded);
    let DeviceFlowOutcome::Succeeded(record) = outcome else {
        panic!("expected success");
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "oauth");
    assert_eq!(json["access"], "at");
    assert_eq!(json["refresh"], "rt");
    assert_eq!(json["accountId"], "org_1");
}

#[tokio::test]
async fn denied_device_flow_is_structured() {
    let mut server = mockito::Server::new_async().await;
    let _code = server
        .mock("POST", "/api/oauth/device/code")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"device_code":"dc","user_code":"C","verification_uri":"https://kilo.ai/device","interval":0}"#)
        .create_async()
        .await;
    let _token = server
        .mock("POST", "/api/oauth/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"access_denied"}"#)
        .create_async()
        .await;

    let mut flow = DeviceFlow::new(HttpDeviceTransport::new(
        reqwest::Client::new(),
        config_for(&server),
    ));
    let outcome = flow.run(&Silent, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeviceFlowOutcome::Denied));
}

#[tokio::test]
async fn unreachable_gateway_fails_without_panicking() {
    let config = OAuthConfig {
        client_id: "kilo-cli".into(),
        auth_url: "http://127.0.0.1:9/api/oauth/device/code".into(),
        token_url: "http://127.0.0.1:9/api/oauth/token".into(),
        scopes: vec![],
    };
    let mut flow = DeviceFlow::new(HttpDeviceTransport::new(reqwest::Client::new(), config));
    let outcome = flow.run(&Silent, &CancellationToken::new()).await;
    assert!(matches!(outcome, DeviceFlowOutcome::Failed(_)));
}

#[tokio::test]
async fn refreshed_record_round_trips_through_storage_json() {
    let mut server = mockito::Server::new_async().await;
    let _token = server
        .mock("POST", "/api/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at2","refresh_token":"rt2","expires_in":60}"#)
        .create_async()
        .await;

    let stored: CredentialRecord = serde_json::from_str(
        r#"{"type":"oauth","access":"at1","refresh":"rt1","expiresAt":1}"#,
    )
    .unwrap();
    assert!(stored.can_refresh());

    let refreshed = refresh_credential(&reqwest::Client::new(), &config_for(&server), &stored)
        .await
        .unwrap();
    let reloaded: CredentialRecord =
        serde_json::from_str(&serde_json::to_string(&refreshed).unwrap()).unwrap();
    let CredentialRecord::OAuth { access, refresh, .. } = reloaded else {
        panic!("expected oauth");
    };
    assert_eq!(access.expose_secret(), "at2");
    assert_eq!(refresh.unwrap().expose_secret(), "rt2");
}
