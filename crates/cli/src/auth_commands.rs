use {
    anyhow::{Result, bail},
    clap::Subcommand,
    kilo_oauth::{CredentialRecord, DeviceAuthSession, DeviceCodePresenter, refresh_credential},
    kilo_plugins::{
        API_KEY_INPUT, AuthMethodKind, AuthorizeInputs, AuthorizeResult, FailureKind,
        KiloGatewayPlugin,
    },
    kilo_providers::shared_http_client,
    tokio_util::sync::CancellationToken,
    tracing::warn,
};

use crate::credential_store::CredentialStore;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in to the Kilo Gateway (device authorization unless --api-key is given).
    Login {
        /// Store a static API key instead of running the device flow.
        #[arg(long, env = "KILO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Do not try to open a browser.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Show the stored credential.
    Status,
    /// Remove the stored credential.
    Logout,
}

pub async fn handle_auth(action: AuthAction, plugin: &KiloGatewayPlugin) -> Result<()> {
    let store = CredentialStore::new();
    match action {
        AuthAction::Login {
            api_key,
            no_browser,
        } => login(plugin, &store, api_key, no_browser).await,
        AuthAction::Status => status(&store),
        AuthAction::Logout => logout(&store),
    }
}

/// Prints the user code and opens the verification page.
struct TerminalPresenter {
    open_browser: bool,
}

impl DeviceCodePresenter for TerminalPresenter {
    fn present(&self, session: &DeviceAuthSession) {
        let url = session.open_url();
        println!("Your code: {}", session.user_code);
        if self.open_browser && open::that(url).is_ok() {
            println!("Opened {url} in your browser.");
        } else {
            println!("Visit {} and enter the code above.", session.verification_uri);
        }
        println!("Waiting for authorization (Ctrl-C to cancel)...");
    }
}

async fn login(
    plugin: &KiloGatewayPlugin,
    store: &CredentialStore,
    api_key: Option<String>,
    no_browser: bool,
) -> Result<()> {
    let (method, inputs) = match api_key {
        Some(key) => (
            AuthMethodKind::Api,
            AuthorizeInputs::from([(API_KEY_INPUT.to_string(), key)]),
        ),
        None => (AuthMethodKind::OAuth, AuthorizeInputs::new()),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let presenter = TerminalPresenter {
        open_browser: !no_browser,
    };
    let result = plugin.authorize(method, &inputs, &presenter, &cancel).await;
    ctrl_c.abort();

    match result {
        AuthorizeResult::Success { credential } => {
            store.save(&credential)?;
            println!("Logged in to Kilo Gateway ({}).", describe(&credential));
            Ok(())
        },
        AuthorizeResult::Failed { kind, reason } => {
            let message = match kind {
                FailureKind::Expired => "the device code expired before it was approved",
                FailureKind::Denied => "authorization was denied",
                FailureKind::Cancelled => "login cancelled",
                FailureKind::MissingInput => "an API key is required",
                FailureKind::Failed => "login failed",
            };
            match reason {
                Some(reason) => bail!("{message}: {reason}"),
                None => bail!("{message}"),
            }
        },
    }
}

fn describe(credential: &CredentialRecord) -> String {
    match credential {
        CredentialRecord::None => "not logged in".into(),
        CredentialRecord::ApiKey { .. } => "API key".into(),
        CredentialRecord::OAuth {
            expires_at,
            account_id,
            ..
        } => {
            let mut parts = vec!["OAuth".to_string()];
            if let Some(account) = account_id {
                parts.push(format!("organization {account}"));
            }
            if let Some(ts) = expires_at {
                parts.push(expiry_label(*ts, unix_now()));
            }
            parts.join(", ")
        },
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn expiry_label(expires_at: u64, now: u64) -> String {
    if expires_at > now {
        let remaining = expires_at - now;
        let hours = remaining / 3600;
        let mins = (remaining % 3600) / 60;
        format!("valid ({hours}h {mins}m remaining)")
    } else {
        "expired".to_string()
    }
}

fn status(store: &CredentialStore) -> Result<()> {
    let credential = store.load()?;
    if credential.is_none() {
        println!("Not logged in. Run `kilo auth login`.");
        return Ok(());
    }
    println!("kilo [{}]", describe(&credential));
    Ok(())
}

fn logout(store: &CredentialStore) -> Result<()> {
    if store.delete()? {
        println!("Logged out from Kilo Gateway");
    } else {
        println!("No stored credential.");
    }
    Ok(())
}

/// The stored credential, refreshed and saved first when it has expired.
/// A failed refresh keeps the old record.
pub async fn current_credential(
    plugin: &KiloGatewayPlugin,
    store: &CredentialStore,
) -> Result<CredentialRecord> {
    let credential = store.load()?;
    if !credential.can_refresh() {
        return Ok(credential);
    }
    match refresh_credential(shared_http_client(), plugin.oauth_config(), &credential).await {
        Ok(refreshed) => {
            store.save(&refreshed)?;
            Ok(refreshed)
        },
        Err(e) => {
            warn!(error = %e, "token refresh failed, using stored credential");
            Ok(credential)
        },
    }
}
