//! Message transport abstraction.
//!
//! The call layer and the liveness monitor only need three things from a
//! socket: send a text frame, receive the next text frame, and round-trip a
//! ping. Keeping that behind a trait lets the connection manager be driven by
//! scripted transports in tests.

use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{WsError, WsResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single bidirectional text-frame channel.
pub trait Transport: Send {
    /// Send one UTF-8 text frame.
    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>>;

    /// Wait for the next text frame, answering control frames on the way.
    fn recv_text(&mut self) -> BoxFuture<'_, WsResult<String>>;

    /// Send a ping carrying `payload` and wait for the matching pong.
    ///
    /// Unbounded; callers wrap it in a timeout.
    fn ping(&mut self, payload: Vec<u8>) -> BoxFuture<'_, WsResult<()>>;

    /// Send a close frame.
    fn close(&mut self) -> BoxFuture<'_, WsResult<()>>;
}

/// Opens new transports to an endpoint.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn Transport>>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport over a tokio-tungstenite WebSocket stream.
pub struct TungsteniteTransport {
    stream: WsStream,
}

impl TungsteniteTransport {
    pub fn new(stream: WsStream) -> Self {
        Self { stream }
    }

    /// Handle a non-text frame. Returns an error for frames that end the
    /// connection.
    async fn handle_control(&mut self, msg: Message) -> WsResult<()> {
        match msg {
            Message::Ping(data) => {
                debug!("Received ping, sending pong");
                self.stream.send(Message::Pong(data)).await?;
                Ok(())
            }
            Message::Pong(_) => {
                debug!("Ignoring unsolicited pong");
                Ok(())
            }
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (f.code.into(), f.reason.to_string()))
                    .unwrap_or((1000, "Normal close".to_string()));
                warn!(code, %reason, "WebSocket closed by server");
                Err(WsError::ConnectionClosed { code, reason })
            }
            _ => Ok(()),
        }
    }

    async fn next_message(&mut self) -> WsResult<Message> {
        match self.stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            Some(Err(e)) => Err(e.into()),
            None => {
                warn!("WebSocket stream ended");
                Err(WsError::ConnectionClosed {
                    code: 1006,
                    reason: "Stream ended".to_string(),
                })
            }
        }
    }
}

impl Transport for TungsteniteTransport {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.stream
                .send(Message::Text(text))
                .await
                .map_err(|e| WsError::SendFailed(e.to_string()))
        })
    }

    fn recv_text(&mut self) -> BoxFuture<'_, WsResult<String>> {
        Box::pin(async move {
            loop {
                match self.next_message().await? {
                    Message::Text(text) => return Ok(text),
                    Message::Binary(bytes) => {
                        return String::from_utf8(bytes)
                            .map_err(|e| WsError::ParseError(format!("non UTF-8 frame: {e}")));
                    }
                    other => self.handle_control(other).await?,
                }
            }
        })
    }

    fn ping(&mut self, payload: Vec<u8>) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.stream.send(Message::Ping(payload.clone())).await?;
            loop {
                match self.next_message().await? {
                    Message::Pong(data) if data == payload => return Ok(()),
                    Message::Text(text) => {
                        // Nothing is subscribed, so a text frame here has no caller.
                        warn!(len = text.len(), "Dropping unexpected text frame during probe");
                    }
                    other => self.handle_control(other).await?,
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.stream.send(Message::Close(None)).await?;
            Ok(())
        })
    }
}

/// Connector that opens tokio-tungstenite WebSocket streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn Transport>>> {
        Box::pin(async move {
            info!(url = %url, "Connecting to WebSocket");
            // TCP_NODELAY on: every frame is a latency-sensitive request.
            let (stream, _response) = connect_async_tls_with_config(url, None, true, None)
                .await
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
            info!("WebSocket connected");
            Ok(Box::new(TungsteniteTransport::new(stream)) as Box<dyn Transport>)
        })
    }
}
