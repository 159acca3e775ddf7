//! In-memory venue for testing.
//!
//! `MockExchange` is a cheap handle over shared state: clone it before handing
//! it to the code under test and inspect the clone afterwards. Immediate-or-
//! cancel orders fill in full when they cross the current quote and are
//! cancelled otherwise.

use chrono::{DateTime, Utc};
use drb_core::{
    Clock, Direction, ManualClock, OrderId, OrderRequest, OrderSide, OrderSnapshot, OrderState,
    Position, Price, Volume,
};
use drb_ws::{BoxFuture, CallError, WsError, UNAUTHORIZED_CODE};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::exchange::Exchange;

/// Operations a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Connect,
    Probe,
    Authenticate,
    GetPosition,
    GetOrderState,
    PlaceOrder,
    BestBid,
    BestOffer,
    LastTrade,
}

impl MockOp {
    /// Whether the real call carries the access token.
    fn is_private(self) -> bool {
        matches!(self, Self::GetPosition | Self::GetOrderState | Self::PlaceOrder)
    }
}

/// Injected failure kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Socket-level fault. Drops the simulated session.
    Transport,
    /// Exchange error object. The session survives.
    Application { code: i64, message: String },
    /// Result without the expected fields.
    Decode,
}

impl MockFailure {
    pub fn application(message: &str) -> Self {
        Self::Application {
            code: 10000,
            message: message.to_string(),
        }
    }

    /// The exchange refusing the access token.
    pub fn unauthorized() -> Self {
        Self::Application {
            code: UNAUTHORIZED_CODE,
            message: "unauthorized".to_string(),
        }
    }

    fn into_error(self, op: MockOp) -> GatewayError {
        match self {
            Self::Transport => GatewayError::Call(CallError::Transport(WsError::ConnectionClosed {
                code: 1006,
                reason: format!("injected fault on {op:?}"),
            })),
            Self::Application { code, message } => {
                GatewayError::Call(CallError::Application { code, message })
            }
            Self::Decode => GatewayError::Decode {
                method: "mock",
                reason: format!("injected decode fault on {op:?}"),
            },
        }
    }
}

/// A recorded call, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    EnsureConnected,
    Probe,
    Authenticate,
    GetPosition,
    GetOrderState(OrderId),
    PlaceOrder(OrderRequest),
    BestBid,
    BestOffer,
    LastTrade,
    Close,
}

#[derive(Debug)]
struct Venue {
    connected: bool,
    token_valid: bool,
    handshakes: u64,
    position: Position,
    position_changes: VecDeque<Position>,
    best_bid: Option<Price>,
    best_offer: Option<Price>,
    last_trade: Option<Price>,
    failures: Vec<(MockOp, MockFailure)>,
    calls: Vec<MockCall>,
    order_times: Vec<DateTime<Utc>>,
    orders: Vec<OrderSnapshot>,
    next_order: u64,
}

impl Default for Venue {
    fn default() -> Self {
        Self {
            connected: false,
            token_valid: true,
            handshakes: 0,
            position: Position::flat(),
            position_changes: VecDeque::new(),
            best_bid: None,
            best_offer: None,
            last_trade: None,
            failures: Vec::new(),
            calls: Vec::new(),
            order_times: Vec::new(),
            orders: Vec::new(),
            next_order: 1,
        }
    }
}

/// Simulated venue with failure injection and call recording.
#[derive(Clone, Default)]
pub struct MockExchange {
    venue: Arc<Mutex<Venue>>,
    clock: Option<Arc<ManualClock>>,
    latency: Duration,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by `latency` on every call.
    pub fn with_latency(mut self, clock: Arc<ManualClock>, latency: Duration) -> Self {
        self.clock = Some(clock);
        self.latency = latency;
        self
    }

    pub fn set_quotes(&self, best_bid: Option<Price>, best_offer: Option<Price>) {
        let mut venue = self.venue.lock();
        venue.best_bid = best_bid;
        venue.best_offer = best_offer;
    }

    pub fn set_last_trade(&self, price: Option<Price>) {
        self.venue.lock().last_trade = price;
    }

    /// Overwrite the held position as a long of `volume`.
    pub fn set_long(&self, volume: u64) {
        let mut venue = self.venue.lock();
        venue.position.volume = Volume::new(volume);
        venue.position.direction = if volume == 0 {
            Direction::None
        } else {
            Direction::Long
        };
    }

    pub fn set_position(&self, position: Position) {
        self.venue.lock().position = position;
    }

    /// Queue an outside change: the position becomes `position` just before
    /// the next position query answers. Changes apply one per query, in order.
    pub fn queue_position(&self, position: Position) {
        self.venue.lock().position_changes.push_back(position);
    }

    /// Mark the simulated session as established without a handshake.
    pub fn set_connected(&self, connected: bool) {
        self.venue.lock().connected = connected;
    }

    /// Let the access token lapse: private calls are refused until the next
    /// handshake.
    pub fn expire_token(&self) {
        self.venue.lock().token_valid = false;
    }

    /// Fail the next call of `op`. Queued failures are consumed in order.
    pub fn fail_next(&self, op: MockOp, failure: MockFailure) {
        self.venue.lock().failures.push((op, failure));
    }

    pub fn position(&self) -> Position {
        self.venue.lock().position.clone()
    }

    pub fn is_session_live(&self) -> bool {
        self.venue.lock().connected
    }

    pub fn handshake_count(&self) -> u64 {
        self.venue.lock().handshakes
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.venue.lock().calls.clone()
    }

    /// Orders received, whether they filled or not.
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.venue
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::PlaceOrder(order) => Some(order.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clock readings at which each order arrived.
    pub fn order_times(&self) -> Vec<DateTime<Utc>> {
        self.venue.lock().order_times.clone()
    }

    fn tick(&self) {
        if let Some(clock) = &self.clock {
            clock.advance(self.latency);
        }
    }

    /// Record `call` and apply any injected failure or the disconnected state.
    fn enter(&self, op: MockOp, call: MockCall) -> GatewayResult<()> {
        self.tick();
        let mut venue = self.venue.lock();
        venue.calls.push(call);

        if op != MockOp::Connect && !venue.connected {
            return Err(GatewayError::Call(CallError::NotConnected));
        }
        if let Some(idx) = venue.failures.iter().position(|(o, _)| *o == op) {
            let (_, failure) = venue.failures.remove(idx);
            if failure == MockFailure::Transport {
                venue.connected = false;
            }
            return Err(failure.into_error(op));
        }
        if op.is_private() && !venue.token_valid {
            return Err(MockFailure::unauthorized().into_error(op));
        }
        Ok(())
    }

    fn execute(&self, order: &OrderRequest) -> OrderId {
        let mut venue = self.venue.lock();
        let id = OrderId::new(format!("MOCK-{}", venue.next_order));
        venue.next_order += 1;
        if let Some(clock) = &self.clock {
            let now = clock.now();
            venue.order_times.push(now);
        } else {
            venue.order_times.push(Utc::now());
        }

        let crosses = match order.side {
            OrderSide::Buy => venue.best_offer.is_some_and(|offer| order.price >= offer),
            OrderSide::Sell => venue.best_bid.is_some_and(|bid| order.price <= bid),
        };

        let (state, filled, average) = if crosses {
            let held = venue.position.volume.get();
            let next = match order.side {
                OrderSide::Buy => held + order.volume.get(),
                OrderSide::Sell => held.saturating_sub(order.volume.get()),
            };
            venue.position.volume = Volume::new(next);
            venue.position.direction = if next == 0 {
                Direction::None
            } else {
                Direction::Long
            };
            (
                OrderState::Filled,
                Decimal::from(order.volume.get()),
                Some(order.price),
            )
        } else {
            (OrderState::Cancelled, Decimal::ZERO, None)
        };

        venue.orders.push(OrderSnapshot {
            order_id: id.clone(),
            state,
            side: order.side,
            filled_amount: filled,
            average_price: average,
        });
        id
    }

    fn quote(&self, op: MockOp, call: MockCall) -> GatewayResult<Price> {
        self.enter(op, call)?;
        let venue = self.venue.lock();
        let (price, what) = match op {
            MockOp::BestBid => (venue.best_bid, "best bid"),
            MockOp::BestOffer => (venue.best_offer, "best offer"),
            _ => (venue.last_trade, "recent trades"),
        };
        price.ok_or_else(|| GatewayError::MissingData(format!("no {what}")))
    }
}

impl Exchange for MockExchange {
    fn is_connected(&self) -> bool {
        self.is_session_live()
    }

    fn ensure_connected(&mut self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            if self.is_session_live() {
                return Ok(());
            }
            self.enter(MockOp::Connect, MockCall::EnsureConnected)?;
            let mut venue = self.venue.lock();
            venue.handshakes += 1;
            venue.connected = true;
            venue.token_valid = true;
            Ok(())
        })
    }

    fn probe(&mut self) -> BoxFuture<'_, GatewayResult<Duration>> {
        Box::pin(async move {
            self.enter(MockOp::Probe, MockCall::Probe)?;
            Ok(self.latency)
        })
    }

    fn authenticate(&mut self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.enter(MockOp::Authenticate, MockCall::Authenticate)?;
            let mut venue = self.venue.lock();
            venue.handshakes += 1;
            venue.token_valid = true;
            Ok(())
        })
    }

    fn get_position(&mut self) -> BoxFuture<'_, GatewayResult<Position>> {
        Box::pin(async move {
            self.enter(MockOp::GetPosition, MockCall::GetPosition)?;
            let mut venue = self.venue.lock();
            if let Some(next) = venue.position_changes.pop_front() {
                venue.position = next;
            }
            Ok(venue.position.clone())
        })
    }

    fn get_order_state<'a>(
        &'a mut self,
        order_id: &'a OrderId,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>> {
        Box::pin(async move {
            self.enter(MockOp::GetOrderState, MockCall::GetOrderState(order_id.clone()))?;
            self.venue
                .lock()
                .orders
                .iter()
                .find(|o| &o.order_id == order_id)
                .cloned()
                .ok_or_else(|| {
                    GatewayError::Call(CallError::Application {
                        code: 10004,
                        message: "order_not_found".to_string(),
                    })
                })
        })
    }

    fn place_order(&mut self, order: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>> {
        Box::pin(async move {
            self.enter(MockOp::PlaceOrder, MockCall::PlaceOrder(order.clone()))?;
            Ok(self.execute(&order))
        })
    }

    fn best_bid(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { self.quote(MockOp::BestBid, MockCall::BestBid) })
    }

    fn best_offer(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { self.quote(MockOp::BestOffer, MockCall::BestOffer) })
    }

    fn last_trade_price(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { self.quote(MockOp::LastTrade, MockCall::LastTrade) })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut venue = self.venue.lock();
            venue.calls.push(MockCall::Close);
            venue.connected = false;
        })
    }
}
