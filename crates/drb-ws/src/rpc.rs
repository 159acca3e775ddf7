//! JSON-RPC call layer.
//!
//! Builds the `{jsonrpc, method, params}` envelope, injects credentials and
//! the access token where asked, sends it, reads back exactly one frame and
//! classifies the outcome:
//! - transport fault (socket error, malformed frame) -> `CallError::Transport`
//! - application fault (response carries `error`) -> `CallError::Application`
//! - success -> the `result` payload
//!
//! Only transport faults cost the session; the connection manager drops it
//! when it sees one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::error::WsError;
use crate::transport::Transport;

/// Protocol version carried by every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Exchange error code for a missing, expired or revoked access token.
pub const UNAUTHORIZED_CODE: i64 = 13009;

/// What a call needs merged into its params.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Merge `client_id` / `client_secret`.
    pub credentials: bool,
    /// Merge `access_token`.
    pub token: bool,
}

impl Access {
    /// Market data: nothing injected.
    pub const PUBLIC: Self = Self {
        credentials: false,
        token: false,
    };
    /// Authentication grant: credentials only.
    pub const AUTH: Self = Self {
        credentials: true,
        token: false,
    };
    /// Account and order methods: credentials and token.
    pub const PRIVATE: Self = Self {
        credentials: true,
        token: true,
    };
}

/// Request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Map<String, Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// Error object of a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outcome classification of a call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("No session")]
    NotConnected,

    #[error("Transport fault: {0}")]
    Transport(#[from] WsError),

    #[error("Exchange error {code}: {message}")]
    Application { code: i64, message: String },
}

impl CallError {
    /// Whether the fault means the session must be rebuilt.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NotConnected)
    }

    /// Whether the exchange refused the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Application { code, .. } if *code == UNAUTHORIZED_CODE)
    }
}

pub type CallResult<T> = Result<T, CallError>;

/// Classify one response frame.
pub fn classify_response(text: &str) -> CallResult<Value> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| WsError::ParseError(format!("invalid JSON response: {e}")))?;

    let Value::Object(mut obj) = value else {
        return Err(WsError::ParseError("response is not a JSON object".to_string()).into());
    };

    match obj.remove("error") {
        Some(Value::Null) | None => {}
        Some(error) => {
            let body: RpcErrorBody =
                serde_json::from_value(error.clone()).unwrap_or_else(|_| RpcErrorBody {
                    code: 0,
                    message: error.to_string(),
                    data: None,
                });
            return Err(CallError::Application {
                code: body.code,
                message: body.message,
            });
        }
    }

    obj.remove("result").ok_or_else(|| {
        WsError::ParseError("response carries neither result nor error".to_string()).into()
    })
}

/// Send `request` and read back its response on `transport`.
pub(crate) async fn round_trip(
    transport: &mut dyn Transport,
    request: &RpcRequest,
) -> CallResult<Value> {
    let payload = serde_json::to_string(request).map_err(WsError::from)?;
    transport.send_text(payload).await?;
    let text = transport.recv_text().await?;
    debug!(method = %request.method, len = text.len(), "Received response");
    classify_response(&text)
}
