//! Core domain types for the Deribit position robot.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Volume`: precision-safe numeric types (volume is lot-step aware)
//! - `OrderSide`, `TimeInForce`, `OrderRequest`: order construction
//! - `Position`, `Direction`: the exchange's position snapshot
//! - `TradeWindow`: target volume, price ceiling and the cooldown deadline
//! - `Clock`: injectable wall-clock source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod status;
pub mod volume;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use order::{
    OrderId, OrderLabel, OrderRequest, OrderSide, OrderSnapshot, OrderState, OrderType,
    TimeInForce,
};
pub use position::{Direction, Position};
pub use status::StatusInfo;
pub use volume::{Volume, LOT_STEP};
pub use window::TradeWindow;
