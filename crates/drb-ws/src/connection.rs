//! Connection manager.
//!
//! Owns the single live `Session`. A session is created by connecting a
//! transport and authenticating on it; if either step fails nothing is kept.
//! Any transport fault seen by a call or a liveness probe drops the session
//! on the spot, so the next caller sees "not connected" rather than a socket
//! that may be dead or a token without a socket.
//!
//! Token-bearing calls renew the token first when it is within
//! `TOKEN_REFRESH_MARGIN` of expiry. A call the exchange answers with
//! `unauthorized` is retried once after a fresh grant.

use chrono::Utc;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth;
use crate::credentials::Credentials;
use crate::error::{WsError, WsResult};
use crate::liveness::LivenessMonitor;
use crate::rpc::{self, Access, CallError, CallResult, RpcRequest};
use crate::session::Session;
use crate::transport::{Connector, TungsteniteConnector};

/// Remaining token lifetime below which a private call renews it first.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Upper bound on opening the transport.
    pub connect_timeout_ms: u64,
    /// How long a liveness probe waits for its pong.
    pub liveness_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "wss://test.deribit.com/ws/api/v2".to_string(),
            connect_timeout_ms: 5000,
            liveness_timeout_ms: 1000,
        }
    }
}

/// Owner of the transport and the access token.
pub struct ConnectionManager<C: Connector = TungsteniteConnector> {
    config: ConnectionConfig,
    connector: C,
    credentials: Credentials,
    session: Option<Session>,
    liveness: LivenessMonitor,
    /// Authentication handshakes attempted.
    handshakes: u64,
    /// Sessions dropped after a transport fault.
    invalidations: u64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a new connection manager. Nothing is opened until
    /// `ensure_connected`.
    pub fn new(config: ConnectionConfig, connector: C, credentials: Credentials) -> Self {
        let liveness = LivenessMonitor::new(Duration::from_millis(config.liveness_timeout_ms));
        Self {
            config,
            connector,
            credentials,
            session: None,
            liveness,
            handshakes: 0,
            invalidations: 0,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a fully established session exists.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn handshake_count(&self) -> u64 {
        self.handshakes
    }

    pub fn invalidation_count(&self) -> u64 {
        self.invalidations
    }

    /// Make sure a session exists, connecting and authenticating if needed.
    ///
    /// A no-op while a session is live. On failure no partial state is kept.
    pub async fn ensure_connected(&mut self) -> WsResult<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let session = self.establish().await?;
        info!(url = %self.config.url, "Session established");
        self.session = Some(session);
        Ok(())
    }

    async fn establish(&mut self) -> WsResult<Session> {
        let connect_timeout_ms = self.config.connect_timeout_ms;
        let connect = self.connector.connect(&self.config.url);
        let mut transport =
            match tokio::time::timeout(Duration::from_millis(connect_timeout_ms), connect).await {
                Ok(result) => result?,
                Err(_) => return Err(WsError::ConnectTimeout(connect_timeout_ms)),
            };

        self.handshakes += 1;
        match auth::authenticate(transport.as_mut(), &self.credentials).await {
            Ok(token) => Ok(Session::new(transport, token)),
            Err(e) => {
                warn!(error = %e, "Authentication failed, discarding transport");
                if let Err(close_err) = transport.close().await {
                    debug!(error = %close_err, "Close after failed auth also failed");
                }
                Err(WsError::AuthFailed(e.to_string()))
            }
        }
    }

    /// Re-run the credentials grant on the live transport and swap the token.
    pub async fn reauthenticate(&mut self) -> CallResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(CallError::NotConnected);
        };

        self.handshakes += 1;
        match auth::authenticate(session.transport_mut(), &self.credentials).await {
            Ok(token) => {
                session.replace_token(token);
                info!("Access token renewed");
                Ok(())
            }
            Err(e) => {
                if e.is_transport() {
                    self.invalidate(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Probe the live transport. A failed probe drops the session.
    pub async fn probe(&mut self) -> WsResult<Duration> {
        let Some(session) = self.session.as_mut() else {
            return Err(WsError::NotConnected);
        };

        match self.liveness.probe(session.transport_mut()).await {
            Ok(rtt) => Ok(rtt),
            Err(e) => {
                self.invalidate(&e.to_string());
                Err(e)
            }
        }
    }

    /// Issue one JSON-RPC call on the live session.
    ///
    /// Transport faults drop the session; application faults leave it alone.
    pub async fn call(
        &mut self,
        method: &str,
        params: Map<String, Value>,
        access: Access,
    ) -> CallResult<Value> {
        if access.token && self.token_expiring() {
            info!(method, "Access token close to expiry, renewing");
            self.reauthenticate().await?;
        }

        match self.send(method, params.clone(), access).await {
            Err(e) if access.token && e.is_unauthorized() => {
                warn!(method, "Access token refused, renewing and retrying");
                self.reauthenticate().await?;
                self.send(method, params, access).await
            }
            other => other,
        }
    }

    fn token_expiring(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.token().is_expiring(Utc::now(), TOKEN_REFRESH_MARGIN))
    }

    async fn send(
        &mut self,
        method: &str,
        mut params: Map<String, Value>,
        access: Access,
    ) -> CallResult<Value> {
        let Some(session) = self.session.as_mut() else {
            return Err(CallError::NotConnected);
        };

        // Logged before secrets are merged in.
        debug!(method, ?params, "api call");
        if access.credentials {
            self.credentials.inject(&mut params);
        }
        if access.token {
            session.token().inject(&mut params);
        }

        let request = RpcRequest::new(method, params);
        match rpc::round_trip(session.transport_mut(), &request).await {
            Ok(result) => Ok(result),
            Err(CallError::Transport(e)) => {
                self.invalidate(&e.to_string());
                Err(CallError::Transport(e))
            }
            Err(e) => {
                warn!(method, error = %e, "api call rejected");
                Err(e)
            }
        }
    }

    /// Drop the session, if any.
    pub fn invalidate(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            self.invalidations += 1;
            let age_secs = (Utc::now() - session.established_at()).num_seconds();
            warn!(reason, age_secs, "Session invalidated");
        }
    }

    /// Close the session gracefully.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.transport_mut().close().await {
                debug!(error = %e, "Close frame not delivered");
            }
            info!("Session closed");
        }
    }
}
