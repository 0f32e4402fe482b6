//! Username/password token exchange against the Azure identity endpoint.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::azure::error::AzureError;

use super::ArmRestClient;

/// Audience the management API expects tokens for.
const MANAGEMENT_RESOURCE: &str = "https://management.core.windows.net/";
/// Lifetime assumed when the identity endpoint omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub(super) struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The v1 endpoint reports `expires_in` as a string; newer ones as a number.
fn token_lifetime(raw: Option<&Value>) -> Duration {
    let seconds = match raw {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    };
    seconds.map_or(DEFAULT_LIFETIME, Duration::from_secs)
}

impl ArmRestClient {
    /// Returns a bearer token, exchanging credentials when the cached token
    /// is missing or about to expire.
    pub(super) async fn bearer_token(&self) -> Result<String, AzureError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Instant::now())
        {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, AzureError> {
        let url = format!(
            "{}/{}/oauth2/token",
            self.endpoints.authority.trim_end_matches('/'),
            self.credentials.tenant
        );
        debug!(tenant = %self.credentials.tenant, "requesting management token");
        let form = [
            ("grant_type", "password"),
            ("client_id", self.credentials.client_id.as_str()),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("resource", MANAGEMENT_RESOURCE),
        ];
        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<TokenErrorResponse>(&body).map_or_else(
                |_| String::from_utf8_lossy(&body).into_owned(),
                |err| match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
            );
            return Err(AzureError::Authentication { message });
        }

        let parsed: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| AzureError::Decode {
                what: String::from("token response"),
                message: err.to_string(),
            })?;
        Ok(AccessToken {
            value: parsed.access_token,
            expires_at: Instant::now() + token_lifetime(parsed.expires_in.as_ref()),
        })
    }
}
