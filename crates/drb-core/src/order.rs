//! Order-related types and identifiers.
//!
//! Provides order side, type, time-in-force, labels and the transient
//! `OrderRequest` built for each attempt.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Price, Volume};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// JSON-RPC method that submits an order on this side.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Buy => "private/buy",
            Self::Sell => "private/sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type. The robot only sends limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Limit,
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Fill what crosses now, drop the rest.
    #[default]
    ImmediateOrCancel,
}

/// Free-form label attached to an order for log correlation.
///
/// Format: `drb-{side}-{uuid_short}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderLabel(String);

impl OrderLabel {
    /// Create a new unique label for an attempt on `side`.
    pub fn new(side: OrderSide) -> Self {
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("drb-{side}-{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OrderLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A limit order for one attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub price: Price,
    pub volume: Volume,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub label: OrderLabel,
}

impl OrderRequest {
    /// Immediate-or-cancel limit order.
    pub fn ioc_limit(side: OrderSide, price: Price, volume: Volume, label: OrderLabel) -> Self {
        Self {
            side,
            price,
            volume,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::ImmediateOrCancel,
            label,
        }
    }
}

/// Lifecycle state reported by the exchange for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    Filled,
    Rejected,
    Cancelled,
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Filled => write!(f, "filled"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of an order as last reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub state: OrderState,
    pub side: OrderSide,
    pub filled_amount: Decimal,
    pub average_price: Option<Price>,
}
