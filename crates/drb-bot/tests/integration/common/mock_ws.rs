//! Mock Deribit JSON-RPC server for integration tests.
//!
//! Provides a WebSocket server that can:
//! - Accept connections and answer pings
//! - Answer auth, position, order book, trades and order methods
//! - Reject orders with an error object
//! - Drop the connection when a chosen method arrives
//! - Issue short-lived access tokens
//! - Record received messages

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug)]
struct ServerState {
    connections: u32,
    auths: u32,
    messages: VecDeque<String>,
    position_size: i64,
    best_bid: f64,
    best_ask: f64,
    last_trade: f64,
    reject_orders: bool,
    close_on: Option<String>,
    next_order: u64,
    token_lifetime_secs: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            connections: 0,
            auths: 0,
            messages: VecDeque::new(),
            position_size: 0,
            best_bid: 29980.0,
            best_ask: 29990.0,
            last_trade: 29985.0,
            reject_orders: false,
            close_on: None,
            next_order: 1,
            token_lifetime_secs: 900,
        }
    }
}

/// A mock JSON-RPC WebSocket server for testing.
pub struct MockRpcServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: Arc<Mutex<ServerState>>,
}

impl MockRpcServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Arc<Mutex<ServerState>> = Arc::new(Mutex::new(ServerState::default()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, state_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            state,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        self.state.lock().await.connections
    }

    pub async fn auth_count(&self) -> u32 {
        self.state.lock().await.auths
    }

    pub async fn received_messages(&self) -> Vec<Value> {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }

    /// Set the signed position size.
    pub async fn set_position(&self, size: i64) {
        self.state.lock().await.position_size = size;
    }

    pub async fn reject_orders(&self, reject: bool) {
        self.state.lock().await.reject_orders = reject;
    }

    /// Lifetime reported for access tokens issued from now on.
    pub async fn set_token_lifetime(&self, secs: u64) {
        self.state.lock().await.token_lifetime_secs = secs;
    }

    /// Close the connection, without replying, when `method` arrives.
    pub async fn close_on(&self, method: &str) {
        self.state.lock().await.close_on = Some(method.to_string());
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<Mutex<ServerState>>) {
    state.lock().await.connections += 1;

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let request: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let method = request["method"].as_str().unwrap_or_default().to_string();

                let reply = {
                    let mut st = state.lock().await;
                    st.messages.push_back(text.clone());
                    if st.close_on.as_deref() == Some(method.as_str()) {
                        None
                    } else {
                        Some(respond(&mut st, &method, &request["params"]))
                    }
                };

                match reply {
                    Some(body) => {
                        if write.send(Message::Text(body.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                if write.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

fn respond(st: &mut ServerState, method: &str, params: &Value) -> Value {
    let result = match method {
        "public/auth" => {
            st.auths += 1;
            json!({
                "access_token": format!("token-{}", st.auths),
                "expires_in": st.token_lifetime_secs,
                "refresh_token": "refresh",
                "scope": "session:mock",
                "token_type": "bearer"
            })
        }
        "private/get_position" => json!({
            "instrument_name": params["instrument_name"],
            "size": st.position_size as f64,
            "direction": match st.position_size {
                0 => "zero",
                s if s > 0 => "buy",
                _ => "sell",
            },
            "floating_profit_loss": 0.0001,
            "total_profit_loss": 0.0003
        }),
        "public/get_order_book" => json!({
            "instrument_name": params["instrument_name"],
            "best_bid_price": st.best_bid,
            "best_ask_price": st.best_ask,
            "bids": [],
            "asks": []
        }),
        "public/get_last_trades_by_instrument" => json!({
            "trades": [{"price": st.last_trade, "amount": 10, "direction": "buy"}],
            "has_more": true
        }),
        "private/buy" | "private/sell" => {
            if st.reject_orders {
                return json!({
                    "jsonrpc": "2.0",
                    "error": {"code": 10009, "message": "not_enough_funds"}
                });
            }
            let amount = params["amount"].as_i64().unwrap_or(0);
            let direction = if method == "private/buy" { "buy" } else { "sell" };
            st.position_size += if direction == "buy" { amount } else { -amount };
            let order_id = format!("MOCK-{}", st.next_order);
            st.next_order += 1;
            json!({
                "order": {
                    "order_id": order_id,
                    "order_state": "filled",
                    "direction": direction,
                    "filled_amount": amount,
                    "average_price": params["price"],
                    "label": params["label"]
                },
                "trades": []
            })
        }
        "private/get_order_state" => json!({
            "order_id": params["order_id"],
            "order_state": "filled",
            "direction": "buy",
            "filled_amount": 10,
            "average_price": 29995.0
        }),
        _ => {
            return json!({
                "jsonrpc": "2.0",
                "error": {"code": -32601, "message": "Method not found"}
            })
        }
    };

    json!({"jsonrpc": "2.0", "result": result, "usIn": 0, "usOut": 0})
}
