//! Trade window: what to hold, up to which price, and when the next attempt
//! may go out.
//!
//! `target_volume` and `price_ceiling` are fixed once at startup. The
//! deadline is pushed to `now + cooldown` after every order attempt,
//! successful or not, so attempts are spaced by at least the cooldown no
//! matter how long the exchange takes to answer.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::{Price, Volume};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeWindow {
    deadline: DateTime<Utc>,
    price_ceiling: Price,
    target_volume: Volume,
    cooldown: chrono::Duration,
}

impl TradeWindow {
    /// Create a window whose first deadline is `now + cooldown`.
    pub fn new(
        target_volume: Volume,
        price_ceiling: Price,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !target_volume.is_lot_multiple() {
            return Err(CoreError::InvalidVolume(format!(
                "target {target_volume} is not a lot multiple"
            )));
        }
        if !price_ceiling.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "ceiling {price_ceiling} must be positive"
            )));
        }
        let cooldown = chrono::Duration::from_std(cooldown)
            .map_err(|e| CoreError::InvalidConfig(format!("cooldown out of range: {e}")))?;
        if cooldown <= chrono::Duration::zero() {
            return Err(CoreError::InvalidConfig(
                "cooldown must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            deadline: now + cooldown,
            price_ceiling,
            target_volume,
            cooldown,
        })
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn price_ceiling(&self) -> Price {
        self.price_ceiling
    }

    pub fn target_volume(&self) -> Volume {
        self.target_volume
    }

    pub fn cooldown(&self) -> chrono::Duration {
        self.cooldown
    }

    /// Entry gate: an attempt may go out once the deadline is reached.
    pub fn entry_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Time half of the exit condition (strictly after the deadline).
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Price half of the exit condition.
    pub fn ceiling_breached(&self, last_trade: Price) -> bool {
        last_trade > self.price_ceiling
    }

    /// Push the deadline to `now + cooldown`. Called after every attempt.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.deadline = now + self.cooldown;
    }

    /// Buy volume for the next entry given what is already held.
    pub fn entry_volume(&self, held: Volume) -> Volume {
        held.remaining_to(self.target_volume)
    }
}
