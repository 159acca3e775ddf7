//! Deribit request params and result payloads.
//!
//! Numbers go out as JSON numbers; decimals in results are accepted as
//! numbers or strings.

use drb_core::{
    Direction, OrderId, OrderRequest, OrderSide, OrderSnapshot, OrderState, OrderType, Position,
    Price, TimeInForce, Volume,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

pub const GET_POSITION: &str = "private/get_position";
pub const GET_ORDER_STATE: &str = "private/get_order_state";
pub const GET_ORDER_BOOK: &str = "public/get_order_book";
pub const GET_LAST_TRADES: &str = "public/get_last_trades_by_instrument";

/// Params shared by the market-data and position queries.
#[derive(Debug, Serialize)]
pub struct InstrumentParams<'a> {
    pub instrument_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl<'a> InstrumentParams<'a> {
    pub fn new(instrument_name: &'a str) -> Self {
        Self {
            instrument_name,
            depth: None,
            count: None,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct OrderStateParams<'a> {
    pub order_id: &'a str,
}

/// `private/buy` and `private/sell` params.
#[derive(Debug, Serialize)]
pub struct OrderParams<'a> {
    pub instrument_name: &'a str,
    pub amount: u64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    pub label: &'a str,
}

impl<'a> OrderParams<'a> {
    pub fn from_request(instrument_name: &'a str, order: &'a OrderRequest) -> Self {
        Self {
            instrument_name,
            amount: order.volume.get(),
            order_type: order.order_type,
            price: order.price.inner(),
            time_in_force: order.time_in_force,
            label: order.label.as_str(),
        }
    }
}

/// Serialize a params struct into the object the call layer expects.
pub fn to_params<T: Serialize>(params: &T) -> GatewayResult<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Decode {
            method: "params",
            reason: format!("params serialized to non-object {other}"),
        }),
    }
}

/// `private/get_position` result.
#[derive(Debug, Deserialize)]
pub struct PositionResult {
    /// Signed size in USD contracts; negative when short.
    pub size: Decimal,
    pub direction: Direction,
    #[serde(default)]
    pub floating_profit_loss: Decimal,
    #[serde(default)]
    pub total_profit_loss: Decimal,
}

impl PositionResult {
    pub fn into_position(self) -> Result<Position, String> {
        let abs = self.size.abs();
        if !abs.fract().is_zero() {
            return Err(format!("fractional size {}", self.size));
        }
        let volume = abs
            .to_u64()
            .ok_or_else(|| format!("size {} out of range", self.size))?;
        Ok(Position {
            volume: Volume::new(volume),
            direction: self.direction,
            unrealized_pnl: self.floating_profit_loss,
            total_pnl: self.total_profit_loss,
        })
    }
}

/// Order object inside order results.
#[derive(Debug, Deserialize)]
pub struct OrderBody {
    pub order_id: String,
    pub order_state: OrderState,
    pub direction: OrderSide,
    #[serde(default)]
    pub filled_amount: Decimal,
    #[serde(default)]
    pub average_price: Option<Decimal>,
}

impl From<OrderBody> for OrderSnapshot {
    fn from(body: OrderBody) -> Self {
        Self {
            order_id: OrderId::new(body.order_id),
            state: body.order_state,
            side: body.direction,
            filled_amount: body.filled_amount,
            average_price: body
                .average_price
                .filter(|p| p.is_sign_positive() && !p.is_zero())
                .map(Price::new),
        }
    }
}

/// `private/buy` / `private/sell` result.
#[derive(Debug, Deserialize)]
pub struct PlacedOrderResult {
    pub order: OrderBody,
    #[serde(default)]
    pub trades: Vec<Value>,
}

/// `public/get_order_book` result, top of book only.
#[derive(Debug, Deserialize)]
pub struct BookResult {
    #[serde(default)]
    pub best_bid_price: Option<Decimal>,
    #[serde(default)]
    pub best_ask_price: Option<Decimal>,
}

/// `public/get_last_trades_by_instrument` result.
#[derive(Debug, Deserialize)]
pub struct TradesResult {
    pub trades: Vec<TradeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TradeEntry {
    pub price: Decimal,
}

/// A quoted price is usable only when present and positive.
pub fn quoted(price: Option<Decimal>, what: &str) -> GatewayResult<Price> {
    match price {
        Some(p) if p > Decimal::ZERO => Ok(Price::new(p)),
        _ => Err(GatewayError::MissingData(format!("no {what}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drb_core::OrderLabel;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_order_params_shape() {
        let order = OrderRequest::ioc_limit(
            OrderSide::Buy,
            Price::new(dec!(29995)),
            Volume::new(50),
            OrderLabel::from("drb-buy-0001".to_string()),
        );
        let params = to_params(&OrderParams::from_request("BTC-PERPETUAL", &order)).unwrap();

        assert_eq!(params["instrument_name"], "BTC-PERPETUAL");
        assert_eq!(params["amount"], 50);
        assert_eq!(params["type"], "limit");
        assert_eq!(params["price"], json!(29995.0));
        assert_eq!(params["time_in_force"], "immediate_or_cancel");
        assert_eq!(params["label"], "drb-buy-0001");
    }

    #[test]
    fn test_instrument_params_skip_unset() {
        let params = to_params(&InstrumentParams::new("BTC-PERPETUAL").with_depth(1)).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["depth"], 1);
        assert!(params.get("count").is_none());
    }

    #[test]
    fn test_short_position_volume_is_absolute() {
        let result: PositionResult = serde_json::from_value(json!({
            "size": -30.0,
            "direction": "sell",
            "floating_profit_loss": 0.0001,
            "total_profit_loss": -0.002
        }))
        .unwrap();
        let position = result.into_position().unwrap();

        assert_eq!(position.volume, Volume::new(30));
        assert_eq!(position.direction, Direction::Short);
        assert_eq!(position.total_pnl, dec!(-0.002));
    }

    #[test]
    fn test_fractional_size_rejected() {
        let result: PositionResult =
            serde_json::from_value(json!({"size": 10.5, "direction": "buy"})).unwrap();
        assert!(result.into_position().is_err());
    }

    #[test]
    fn test_order_body_zero_average_price_is_none() {
        let body: OrderBody = serde_json::from_value(json!({
            "order_id": "ETH-1",
            "order_state": "cancelled",
            "direction": "buy",
            "filled_amount": 0,
            "average_price": 0.0
        }))
        .unwrap();
        let snapshot = OrderSnapshot::from(body);
        assert_eq!(snapshot.state, OrderState::Cancelled);
        assert!(snapshot.average_price.is_none());
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted(Some(dec!(100)), "bid").unwrap(), Price::new(dec!(100)));
        assert!(quoted(None, "bid").is_err());
        assert!(quoted(Some(Decimal::ZERO), "bid").is_err());
    }
}
