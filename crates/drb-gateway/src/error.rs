//! Gateway error types.

use drb_ws::{CallError, WsError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error("Connection error: {0}")]
    Connection(#[from] WsError),

    /// Well-formed result that does not carry the expected fields.
    #[error("Unexpected {method} result: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("Request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Empty book side, no trades, or a similar hole in market data.
    #[error("Missing data: {0}")]
    MissingData(String),
}

impl GatewayError {
    /// Whether the session is gone and must be rebuilt.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Call(e) => e.is_transport(),
            Self::Connection(_) => true,
            Self::Encode(_) | Self::Decode { .. } | Self::MissingData(_) => false,
        }
    }

    /// Whether the exchange refused the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Call(e) if e.is_unauthorized())
    }

    /// Whether the exchange answered with an error object.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Call(CallError::Application { .. }))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let transport = GatewayError::from(CallError::Transport(WsError::NotConnected));
        assert!(transport.is_transport());
        assert!(!transport.is_application());

        let app = GatewayError::from(CallError::Application {
            code: 10009,
            message: "not_enough_funds".into(),
        });
        assert!(app.is_application());
        assert!(!app.is_transport());

        let decode = GatewayError::Decode {
            method: "private/buy",
            reason: "no order".into(),
        };
        assert!(!decode.is_transport());
        assert!(!GatewayError::MissingData("no bid".into()).is_transport());

        let expired = GatewayError::from(CallError::Application {
            code: drb_ws::UNAUTHORIZED_CODE,
            message: "unauthorized".into(),
        });
        assert!(expired.is_unauthorized());
        assert!(expired.is_application());
        assert!(!app.is_unauthorized());
    }
}
