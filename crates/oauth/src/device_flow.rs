//! OAuth 2.0 device authorization grant (RFC 8628).
//!
//! [`DeviceFlow`] drives one authorization attempt through
//! `Requesting → AwaitingUser → Polling → {Succeeded, Expired, Denied, Failed, Cancelled}`.
//! Network I/O goes through [`DeviceAuthTransport`] so the state machine can
//! be driven by a scripted transport and a paused tokio clock in tests.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::header::HeaderMap,
    serde_json::Value,
    tokio::time::Instant,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result, credential::CredentialRecord, token::parse_token_response, types::OAuthConfig,
};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Added to the polling interval for every `slow_down` (RFC 8628 §3.5).
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Shortest polling interval honoured, whatever the server sends.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_interval() -> u64 {
    5
}

fn default_expires_in() -> u64 {
    900
}

/// One authorization attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct DeviceAuthSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval: Duration,
    pub expires_at: Instant,
}

impl DeviceAuthSession {
    pub fn from_response(resp: DeviceCodeResponse, issued_at: Instant) -> Self {
        Self {
            verification_uri_complete: build_verification_uri_complete(
                &resp.verification_uri,
                &resp.user_code,
                resp.verification_uri_complete,
            ),
            device_code: resp.device_code,
            user_code: resp.user_code,
            verification_uri: resp.verification_uri,
            interval: Duration::from_secs(resp.interval).max(MIN_POLL_INTERVAL),
            expires_at: issued_at + Duration::from_secs(resp.expires_in),
        }
    }

    /// URL the user should open: the complete URI when available.
    pub fn open_url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }
}

/// Prefer the server's `verification_uri_complete`; otherwise append the
/// user code as a `user_code` query parameter.
fn build_verification_uri_complete(
    verification_uri: &str,
    user_code: &str,
    provided_complete: Option<String>,
) -> Option<String> {
    if let Some(complete) = provided_complete
        && !complete.trim().is_empty()
    {
        return Some(complete);
    }
    let mut url = url::Url::parse(verification_uri).ok()?;
    url.query_pairs_mut().append_pair("user_code", user_code);
    Some(url.to_string())
}

/// Result of a single token poll.
#[derive(Debug)]
pub enum TokenPoll {
    Granted(CredentialRecord),
    Pending,
    SlowDown,
    Expired,
    Denied,
}

/// Network side of the device grant.
#[async_trait]
pub trait DeviceAuthTransport: Send + Sync {
    async fn request_device_code(&self) -> Result<DeviceCodeResponse>;
    async fn poll_token(&self, device_code: &str) -> Result<TokenPoll>;
}

/// Shows the user code and verification URL to the user.
pub trait DeviceCodePresenter: Send + Sync {
    fn present(&self, session: &DeviceAuthSession);
}

/// [`DeviceAuthTransport`] over HTTP.
pub struct HttpDeviceTransport {
    client: reqwest::Client,
    config: OAuthConfig,
    extra_headers: HeaderMap,
}

impl HttpDeviceTransport {
    pub fn new(client: reqwest::Client, config: OAuthConfig) -> Self {
        Self {
            client,
            config,
            extra_headers: HeaderMap::new(),
        }
    }

    /// Send `headers` with every device-flow request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.extra_headers = headers;
        self
    }
}

#[async_trait]
impl DeviceAuthTransport for HttpDeviceTransport {
    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let scope = self.config.scope_param();
        let resp = self
            .client
            .post(&self.config.auth_url)
            .header("Accept", "application/json")
            .headers(self.extra_headers.clone())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::DeviceCodeRequest {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }

    async fn poll_token(&self, device_code: &str) -> Result<TokenPoll> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .headers(self.extra_headers.clone())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT),
            ])
            .send()
            .await?;

        // Pending/slow_down/denied arrive as HTTP 400 with a JSON body.
        let body: Value = resp.json().await?;
        classify_poll_response(&body)
    }
}

fn classify_poll_response(body: &Value) -> Result<TokenPoll> {
    if body.get("access_token").and_then(Value::as_str).is_some() {
        return parse_token_response(body).map(TokenPoll::Granted);
    }

    match body.get("error").and_then(Value::as_str) {
        Some("authorization_pending") => Ok(TokenPoll::Pending),
        Some("slow_down") => Ok(TokenPoll::SlowDown),
        Some("expired_token") => Ok(TokenPoll::Expired),
        Some("access_denied") => Ok(TokenPoll::Denied),
        Some(code) => Err(Error::DeviceFlow {
            code: code.to_string(),
            description: body
                .get("error_description")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        }),
        None => Err(Error::UnexpectedTokenResponse),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFlowState {
    Requesting,
    AwaitingUser,
    Polling,
    Succeeded,
    Expired,
    Denied,
    Failed,
    Cancelled,
}

impl DeviceFlowState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Requesting | Self::AwaitingUser | Self::Polling)
    }
}

/// Terminal result of a device flow. Only `Succeeded` carries a credential.
#[derive(Debug)]
pub enum DeviceFlowOutcome {
    Succeeded(CredentialRecord),
    Expired,
    Denied,
    Failed(String),
    Cancelled,
}

impl DeviceFlowOutcome {
    pub fn state(&self) -> DeviceFlowState {
        match self {
            Self::Succeeded(_) => DeviceFlowState::Succeeded,
            Self::Expired => DeviceFlowState::Expired,
            Self::Denied => DeviceFlowState::Denied,
            Self::Failed(_) => DeviceFlowState::Failed,
            Self::Cancelled => DeviceFlowState::Cancelled,
        }
    }
}

/// State machine for one device authorization attempt.
pub struct DeviceFlow<T> {
    transport: T,
    state: DeviceFlowState,
}

impl<T: DeviceAuthTransport> DeviceFlow<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: DeviceFlowState::Requesting,
        }
    }

    pub fn state(&self) -> DeviceFlowState {
        self.state
    }

    fn transition(&mut self, next: DeviceFlowState) {
        debug!(from = ?self.state, to = ?next, "device flow transition");
        self.state = next;
    }

    fn finish(&mut self, outcome: DeviceFlowOutcome) -> DeviceFlowOutcome {
        self.transition(outcome.state());
        outcome
    }

    /// Run the whole flow. Never returns an error: every failure mode is a
    /// [`DeviceFlowOutcome`] variant.
    pub async fn run(
        &mut self,
        presenter: &dyn DeviceCodePresenter,
        cancel: &CancellationToken,
    ) -> DeviceFlowOutcome {
        let requested = tokio::select! {
            biased;
            () = cancel.cancelled() => return self.finish(DeviceFlowOutcome::Cancelled),
            requested = self.transport.request_device_code() => requested,
        };
        let session = match requested {
            Ok(resp) => DeviceAuthSession::from_response(resp, Instant::now()),
            Err(e) => {
                warn!(error = %e, "device code request failed");
                return self.finish(DeviceFlowOutcome::Failed(e.to_string()));
            },
        };

        self.transition(DeviceFlowState::AwaitingUser);
        presenter.present(&session);

        self.poll_until_complete(&session, cancel).await
    }

    /// Poll the token endpoint until the session reaches a terminal state.
    pub async fn poll_until_complete(
        &mut self,
        session: &DeviceAuthSession,
        cancel: &CancellationToken,
    ) -> DeviceFlowOutcome {
        self.transition(DeviceFlowState::Polling);
        let mut interval = session.interval;

        loop {
            let next_poll = Instant::now() + interval;
            if next_poll > session.expires_at {
                info!("device code expired before authorization completed");
                return self.finish(DeviceFlowOutcome::Expired);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return self.finish(DeviceFlowOutcome::Cancelled),
                () = tokio::time::sleep_until(next_poll) => {},
            }

            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => return self.finish(DeviceFlowOutcome::Cancelled),
                polled = self.transport.poll_token(&session.device_code) => polled,
            };

            match polled {
                Ok(TokenPoll::Granted(credential)) => {
                    info!("device authorization granted");
                    return self.finish(DeviceFlowOutcome::Succeeded(credential));
                },
                Ok(TokenPoll::Pending) => {},
                Ok(TokenPoll::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "token endpoint asked to slow down");
                },
                Ok(TokenPoll::Expired) => return self.finish(DeviceFlowOutcome::Expired),
                Ok(TokenPoll::Denied) => return self.finish(DeviceFlowOutcome::Denied),
                Err(e) => {
                    warn!(error = %e, "device flow polling failed");
                    return self.finish(DeviceFlowOutcome::Failed(e.to_string()));
                },
            }
        }
    }
}
