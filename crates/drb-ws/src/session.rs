//! The one live session: a transport together with its access token.
//!
//! A `Session` only exists fully formed. Its constructor and mutators are
//! crate-private so that nothing outside the connection manager can build,
//! patch or reuse one.

use chrono::{DateTime, Utc};

use crate::credentials::AccessToken;
use crate::transport::Transport;

pub struct Session {
    transport: Box<dyn Transport>,
    token: AccessToken,
    established_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(transport: Box<dyn Transport>, token: AccessToken) -> Self {
        Self {
            transport,
            token,
            established_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub(crate) fn replace_token(&mut self, token: AccessToken) {
        self.token = token;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}
