//! Position snapshot as reported by the exchange.
//!
//! The robot never infers its position from its own fills; every field here
//! is overwritten from the latest position query.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Volume;

/// Direction of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "buy")]
    Long,
    #[serde(rename = "sell")]
    Short,
    #[default]
    #[serde(rename = "zero")]
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Latest position snapshot for the traded instrument.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    /// Absolute position size in contracts.
    pub volume: Volume,
    pub direction: Direction,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
}

impl Position {
    /// Flat position with zero PnL.
    pub fn flat() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.volume.is_zero()
    }

    /// A non-empty long, the only position the exit loop sells down.
    #[inline]
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long && !self.volume.is_zero()
    }
}
