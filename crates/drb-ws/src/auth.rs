//! Client-credentials authentication.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::credentials::{AccessToken, Credentials};
use crate::error::WsError;
use crate::rpc::{round_trip, CallResult, RpcRequest};
use crate::transport::Transport;

/// Public auth method.
pub const AUTH_METHOD: &str = "public/auth";

#[derive(Debug, Deserialize)]
struct AuthResult {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    scope: String,
}

/// Exchange client credentials for an access token on `transport`.
pub(crate) async fn authenticate(
    transport: &mut dyn Transport,
    credentials: &Credentials,
) -> CallResult<AccessToken> {
    let mut params = Map::new();
    params.insert("grant_type".to_string(), Value::from("client_credentials"));
    debug!(method = AUTH_METHOD, client_id = %credentials.client_id(), "api call");
    credentials.inject(&mut params);

    let result = round_trip(transport, &RpcRequest::new(AUTH_METHOD, params)).await?;
    let auth: AuthResult = serde_json::from_value(result)
        .map_err(|e| WsError::AuthFailed(format!("unexpected auth result: {e}")))?;

    info!(
        expires_in_secs = auth.expires_in,
        scope = %auth.scope,
        "Authenticated"
    );
    Ok(AccessToken::new(auth.access_token, auth.expires_in, auth.scope))
}
