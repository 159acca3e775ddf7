//! API credentials and the access token obtained with them.
//!
//! Secrets live in `Zeroizing` buffers and are redacted from `Debug` output.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Client key and secret for the credentials grant.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Merge `client_id` / `client_secret` into request params.
    pub(crate) fn inject(&self, params: &mut Map<String, Value>) {
        params.insert("client_id".to_string(), Value::from(self.client_id.as_str()));
        params.insert(
            "client_secret".to_string(),
            Value::from(self.client_secret.as_str()),
        );
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Caps the lifetime used for expiry arithmetic at ten years.
const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 3600;

/// Access token returned by the auth method.
#[derive(Clone)]
pub struct AccessToken {
    token: Zeroizing<String>,
    expires_in_secs: u64,
    scope: String,
    obtained_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in_secs: u64, scope: impl Into<String>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            expires_in_secs,
            scope: scope.into(),
            obtained_at: Utc::now(),
        }
    }

    /// When the exchange stops accepting this token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let lifetime = i64::try_from(self.expires_in_secs).unwrap_or(i64::MAX);
        self.obtained_at + chrono::Duration::seconds(lifetime.min(MAX_LIFETIME_SECS))
    }

    /// Whether the token expires within `margin` of `now`.
    pub fn is_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
        now + margin >= self.expires_at()
    }

    /// Merge `access_token` into request params.
    pub(crate) fn inject(&self, params: &mut Map<String, Value>) {
        params.insert(
            "access_token".to_string(),
            Value::from(self.token.as_str()),
        );
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}
