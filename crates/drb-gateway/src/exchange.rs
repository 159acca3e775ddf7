//! Exchange trait: the operations the position controller needs.
//!
//! Uses `BoxFuture` so the trait stays dyn-compatible and mockable.

use drb_core::{
    OrderId, OrderLabel, OrderRequest, OrderSide, OrderSnapshot, Position, Price, Volume,
};
use drb_ws::BoxFuture;
use std::time::Duration;

use crate::error::GatewayResult;

/// One instrument on one account.
///
/// Every call returns exchange data or a typed failure. Callers branch on
/// `GatewayError::is_transport` to decide whether the session must be rebuilt.
pub trait Exchange: Send {
    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Connect and authenticate if no session exists.
    fn ensure_connected(&mut self) -> BoxFuture<'_, GatewayResult<()>>;

    /// Bounded liveness probe. A failure drops the session.
    fn probe(&mut self) -> BoxFuture<'_, GatewayResult<Duration>>;

    /// Re-run the credentials grant and replace the access token.
    fn authenticate(&mut self) -> BoxFuture<'_, GatewayResult<()>>;

    fn get_position(&mut self) -> BoxFuture<'_, GatewayResult<Position>>;

    fn get_order_state<'a>(
        &'a mut self,
        order_id: &'a OrderId,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>>;

    /// Submit an order. Returns the exchange-assigned id once accepted.
    fn place_order(&mut self, order: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>>;

    fn best_bid(&mut self) -> BoxFuture<'_, GatewayResult<Price>>;

    fn best_offer(&mut self) -> BoxFuture<'_, GatewayResult<Price>>;

    fn last_trade_price(&mut self) -> BoxFuture<'_, GatewayResult<Price>>;

    /// Close the session gracefully.
    fn close(&mut self) -> BoxFuture<'_, ()>;

    /// Immediate-or-cancel limit buy.
    fn place_buy(
        &mut self,
        price: Price,
        volume: Volume,
        label: OrderLabel,
    ) -> BoxFuture<'_, GatewayResult<OrderId>> {
        self.place_order(OrderRequest::ioc_limit(OrderSide::Buy, price, volume, label))
    }

    /// Immediate-or-cancel limit sell.
    fn place_sell(
        &mut self,
        price: Price,
        volume: Volume,
        label: OrderLabel,
    ) -> BoxFuture<'_, GatewayResult<OrderId>> {
        self.place_order(OrderRequest::ioc_limit(OrderSide::Sell, price, volume, label))
    }
}
