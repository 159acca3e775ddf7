//! Deribit implementation of `Exchange`.

use drb_core::{OrderId, OrderRequest, OrderSnapshot, Position, Price};
use drb_ws::{
    Access, BoxFuture, ConnectionManager, Connector, TungsteniteConnector,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::exchange::Exchange;
use crate::wire::{
    self, BookResult, InstrumentParams, OrderParams, OrderStateParams, PlacedOrderResult,
    PositionResult, TradesResult,
};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Traded instrument, e.g. `BTC-PERPETUAL`.
    pub instrument: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            instrument: "BTC-PERPETUAL".to_string(),
        }
    }
}

/// Typed calls over the connection manager for a single instrument.
pub struct DeribitGateway<C: Connector = TungsteniteConnector> {
    config: GatewayConfig,
    connection: ConnectionManager<C>,
}

impl<C: Connector> DeribitGateway<C> {
    pub fn new(config: GatewayConfig, connection: ConnectionManager<C>) -> Self {
        Self { config, connection }
    }

    async fn request<P, T>(&mut self, method: &'static str, params: &P, access: Access) -> GatewayResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let params = wire::to_params(params)?;
        let result = self.connection.call(method, params, access).await?;
        serde_json::from_value(result).map_err(|e| GatewayError::Decode {
            method,
            reason: e.to_string(),
        })
    }

    async fn fetch_position(&mut self) -> GatewayResult<Position> {
        let instrument = self.config.instrument.clone();
        let result: PositionResult = self
            .request(wire::GET_POSITION, &InstrumentParams::new(&instrument), Access::PRIVATE)
            .await?;
        result
            .into_position()
            .map_err(|reason| GatewayError::Decode {
                method: wire::GET_POSITION,
                reason,
            })
    }

    async fn fetch_order_state(&mut self, order_id: &OrderId) -> GatewayResult<OrderSnapshot> {
        let params = OrderStateParams {
            order_id: order_id.as_str(),
        };
        let body: wire::OrderBody = self
            .request(wire::GET_ORDER_STATE, &params, Access::PRIVATE)
            .await?;
        Ok(body.into())
    }

    async fn submit(&mut self, order: OrderRequest) -> GatewayResult<OrderId> {
        let instrument = self.config.instrument.clone();
        let method = order.side.method();
        let params = OrderParams::from_request(&instrument, &order);
        let result: PlacedOrderResult = self.request(method, &params, Access::PRIVATE).await?;

        info!(
            side = %order.side,
            price = %order.price,
            volume = %order.volume,
            label = %order.label,
            order_id = %result.order.order_id,
            state = %result.order.order_state,
            fills = result.trades.len(),
            "Order accepted"
        );
        Ok(OrderId::new(result.order.order_id))
    }

    async fn fetch_book(&mut self) -> GatewayResult<BookResult> {
        let instrument = self.config.instrument.clone();
        self.request(
            wire::GET_ORDER_BOOK,
            &InstrumentParams::new(&instrument).with_depth(1),
            Access::PUBLIC,
        )
        .await
    }

    async fn fetch_last_trade(&mut self) -> GatewayResult<Price> {
        let instrument = self.config.instrument.clone();
        let result: TradesResult = self
            .request(
                wire::GET_LAST_TRADES,
                &InstrumentParams::new(&instrument).with_count(1),
                Access::PUBLIC,
            )
            .await?;
        let trade = result
            .trades
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MissingData("no recent trades".to_string()))?;
        debug!(price = %trade.price, "Last trade");
        Ok(Price::new(trade.price))
    }
}

impl<C: Connector> Exchange for DeribitGateway<C> {
    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn ensure_connected(&mut self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move { Ok(self.connection.ensure_connected().await?) })
    }

    fn probe(&mut self) -> BoxFuture<'_, GatewayResult<Duration>> {
        Box::pin(async move { Ok(self.connection.probe().await?) })
    }

    fn authenticate(&mut self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move { Ok(self.connection.reauthenticate().await?) })
    }

    fn get_position(&mut self) -> BoxFuture<'_, GatewayResult<Position>> {
        Box::pin(self.fetch_position())
    }

    fn get_order_state<'a>(
        &'a mut self,
        order_id: &'a OrderId,
    ) -> BoxFuture<'a, GatewayResult<OrderSnapshot>> {
        Box::pin(self.fetch_order_state(order_id))
    }

    fn place_order(&mut self, order: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>> {
        Box::pin(self.submit(order))
    }

    fn best_bid(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { wire::quoted(self.fetch_book().await?.best_bid_price, "best bid") })
    }

    fn best_offer(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(async move { wire::quoted(self.fetch_book().await?.best_ask_price, "best offer") })
    }

    fn last_trade_price(&mut self) -> BoxFuture<'_, GatewayResult<Price>> {
        Box::pin(self.fetch_last_trade())
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.connection.disconnect())
    }
}
