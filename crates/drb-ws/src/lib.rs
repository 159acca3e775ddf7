//! JSON-RPC over WebSocket session layer.
//!
//! Provides the pieces the robot needs to talk to the exchange:
//! - A `Transport` abstraction with a tokio-tungstenite implementation
//! - `ConnectionManager`: owns the single live `Session` (transport + token)
//!   and refreshes the token before it expires
//! - The request/response call layer with credential and token injection
//! - `LivenessMonitor`: bounded ping/pong probe of the live transport
//!
//! One request is in flight at a time; responses are matched positionally.

pub mod auth;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod liveness;
pub mod rpc;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionConfig, ConnectionManager};
pub use credentials::{AccessToken, Credentials};
pub use error::{WsError, WsResult};
pub use liveness::LivenessMonitor;
pub use rpc::{
    Access, CallError, CallResult, RpcErrorBody, RpcRequest, JSONRPC_VERSION, UNAUTHORIZED_CODE,
};
pub use session::Session;
pub use transport::{BoxFuture, Connector, Transport, TungsteniteConnector, TungsteniteTransport};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
