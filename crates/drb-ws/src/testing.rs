//! Scripted transports for unit tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{WsError, WsResult};
use crate::transport::{BoxFuture, Connector, Transport};

/// How a scripted transport answers a ping.
#[derive(Debug, Clone, Copy)]
pub enum PingReply {
    Pong,
    Closed,
    Silent,
}

/// Transport that replays canned response frames.
pub struct ScriptedTransport {
    responses: VecDeque<WsResult<String>>,
    pings: VecDeque<PingReply>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<WsResult<String>>) -> Self {
        Self {
            responses: responses.into(),
            pings: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_pings(mut self, pings: Vec<PingReply>) -> Self {
        self.pings = pings.into();
        self
    }

    /// Shared log of every frame sent.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.sent.lock().push(text);
            Ok(())
        })
    }

    fn recv_text(&mut self) -> BoxFuture<'_, WsResult<String>> {
        Box::pin(async move {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(WsError::ConnectionClosed {
                    code: 1006,
                    reason: "script exhausted".to_string(),
                }))
        })
    }

    fn ping(&mut self, _payload: Vec<u8>) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            match self.pings.pop_front().unwrap_or(PingReply::Pong) {
                PingReply::Pong => Ok(()),
                PingReply::Closed => Err(WsError::ConnectionClosed {
                    code: 1006,
                    reason: "closed during probe".to_string(),
                }),
                PingReply::Silent => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Connector handing out pre-built transports in order.
pub struct ScriptedConnector {
    transports: Mutex<VecDeque<WsResult<ScriptedTransport>>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(transports: Vec<WsResult<ScriptedTransport>>) -> Self {
        Self {
            transports: Mutex::new(transports.into()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn Transport>>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self.transports.lock().pop_front();
            match next {
                Some(Ok(t)) => Ok(Box::new(t) as Box<dyn Transport>),
                Some(Err(e)) => Err(e),
                None => Err(WsError::ConnectionFailed("no scripted transport".to_string())),
            }
        })
    }
}

/// Canned successful auth response.
pub fn auth_ok(token: &str) -> WsResult<String> {
    auth_ok_expiring(token, 900)
}

/// Canned auth response for a token living `expires_in` seconds.
pub fn auth_ok_expiring(token: &str, expires_in: u64) -> WsResult<String> {
    Ok(format!(
        r#"{{"jsonrpc":"2.0","result":{{"access_token":"{token}","expires_in":{expires_in},"refresh_token":"r","scope":"session:test","token_type":"bearer"}}}}"#
    ))
}

/// Canned rejection of the access token.
pub fn unauthorized() -> WsResult<String> {
    Ok(r#"{"jsonrpc":"2.0","error":{"code":13009,"message":"unauthorized"}}"#.to_string())
}
