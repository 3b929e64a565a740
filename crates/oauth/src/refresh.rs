use {
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use crate::{Error, Result, credential::CredentialRecord, token::parse_token_response, types::OAuthConfig};

/// Exchange the refresh token of an OAuth record for a new access token.
///
/// The server may omit the refresh token or account id in its response; the
/// previous values are kept in that case.
pub async fn refresh_credential(
    client: &reqwest::Client,
    config: &OAuthConfig,
    record: &CredentialRecord,
) -> Result<CredentialRecord> {
    let CredentialRecord::OAuth {
        refresh: Some(previous_refresh),
        account_id: previous_account,
        ..
    } = record
    else {
        return Err(Error::message("credential has no refresh token"));
    };

    debug!(kind = record.kind(), "refreshing OAuth credential");
    let resp = client
        .post(&config.token_url)
        .header("Accept", "application/json")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", previous_refresh.expose_secret().as_str()),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "token refresh rejected");
        return Err(Error::message(format!(
            "token refresh failed (HTTP {status}): {body}"
        )));
    }

    let body: serde_json::Value = resp.json().await?;
    let mut refreshed = parse_token_response(&body)?;
    if let CredentialRecord::OAuth {
        refresh, account_id, ..
    } = &mut refreshed
    {
        if refresh.is_none() {
            *refresh = Some(previous_refresh.clone());
        }
        if account_id.is_none() {
            account_id.clone_from(previous_account);
        }
    }
    Ok(refreshed)
}
