//! Contract volume in exchange lots.
//!
//! Perpetual amounts on the venue are whole USD contracts traded in steps of
//! `LOT_STEP`. The target volume is validated against the step once at input
//! time; order volumes derived from it stay on the step by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Minimum amount increment accepted by the venue.
pub const LOT_STEP: u64 = 10;

/// Non-negative contract volume.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Volume(pub u64);

impl Volume {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the volume sits on the lot step.
    #[inline]
    pub fn is_lot_multiple(&self) -> bool {
        self.0 % LOT_STEP == 0
    }

    /// Build a target volume, rejecting anything off the lot step.
    pub fn target(value: u64) -> Result<Self, CoreError> {
        let volume = Self(value);
        if !volume.is_lot_multiple() {
            return Err(CoreError::InvalidVolume(format!(
                "{value} is not a multiple of {LOT_STEP}"
            )));
        }
        Ok(volume)
    }

    /// Parse a user-supplied target volume.
    pub fn parse_target(s: &str) -> Result<Self, CoreError> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|e| CoreError::InvalidVolume(format!("{s:?}: {e}")))?;
        Self::target(value)
    }

    /// Volume still missing to reach `target`, rounded down to the lot step.
    ///
    /// Never exceeds `target - self` and is always a lot multiple.
    pub fn remaining_to(&self, target: Volume) -> Volume {
        let missing = target.0.saturating_sub(self.0);
        Volume((missing / LOT_STEP) * LOT_STEP)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Volume {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
