//! State threaded through every controller step.

use chrono::{DateTime, Utc};
use drb_core::{Position, Price, StatusInfo, TradeWindow};
use std::fmt;

/// Logical phase of the position lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing held.
    #[default]
    Idle,
    /// Holding less than the target, exit not triggered.
    Opening,
    /// Holding the target or more, exit not triggered.
    Holding,
    /// Exit triggered with a position still open.
    Closing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Opening => write!(f, "opening"),
            Self::Holding => write!(f, "holding"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// Controller state between ticks.
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// Last position snapshot from the exchange.
    pub position: Position,
    pub window: TradeWindow,
    pub status: StatusInfo,
    /// Result of the last connect + liveness check.
    pub connection_ok: bool,
    /// Last trade price seen while evaluating the exit condition.
    pub last_trade: Option<Price>,
}

impl ControllerState {
    pub fn new(window: TradeWindow) -> Self {
        Self {
            position: Position::flat(),
            window,
            status: StatusInfo::default(),
            connection_ok: false,
            last_trade: None,
        }
    }

    /// Exit condition as last observed: deadline passed or ceiling breached.
    pub fn exit_triggered(&self, now: DateTime<Utc>) -> bool {
        self.window.deadline_passed(now)
            || self
                .last_trade
                .is_some_and(|p| self.window.ceiling_breached(p))
    }

    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        if self.position.is_flat() {
            Phase::Idle
        } else if self.exit_triggered(now) {
            Phase::Closing
        } else if self.position.volume >= self.window.target_volume() {
            Phase::Holding
        } else {
            Phase::Opening
        }
    }
}
