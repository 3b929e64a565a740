//! Token endpoint responses → [`CredentialRecord`].

use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    },
    secrecy::Secret,
    serde_json::Value,
};

use crate::{
    Error, Result,
    credential::{CredentialRecord, unix_now},
};

/// Build an OAuth credential from a successful token response.
pub fn parse_token_response(resp: &Value) -> Result<CredentialRecord> {
    let access_token = resp["access_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::message("missing access_token in response"))?
        .to_string();

    let refresh_token = resp["refresh_token"].as_str().map(ToString::to_string);
    let account_id = non_blank(resp.get("account_id"))
        .or_else(|| non_blank(resp.get("organization_id")))
        .or_else(|| extract_account_id_from_jwt(&access_token));
    let expires_at = resp["expires_in"]
        .as_u64()
        .map(|secs| unix_now().saturating_add(secs));

    Ok(CredentialRecord::OAuth {
        access: Secret::new(access_token),
        refresh: refresh_token.map(Secret::new),
        expires_at,
        account_id,
    })
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn extract_account_id_from_jwt(token: &str) -> Option<String> {
    let claims = parse_jwt_claims(token)?;
    ["kiloOrganizationId", "organization_id", "org_id"]
        .iter()
        .find_map(|key| non_blank(claims.get(*key)))
}

fn parse_jwt_claims(token: &str) -> Option<Value> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).or_else(|_| {
        let padded = match payload_b64.len() % 4 {
            2 => format!("{payload_b64}=="),
            3 => format!("{payload_b64}="),
            _ => payload_b64.to_string(),
        };
        STANDARD.decode(padded)
    });
    serde_json::from_slice(&payload.ok()?).ok()
}
