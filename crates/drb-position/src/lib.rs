//! Position lifecycle controller.
//!
//! Decides once per tick whether to buy toward the target volume, sell the
//! position down, or do nothing, based on the exchange's latest position, the
//! trade window deadline and the price ceiling.
//!
//! - `ControllerState`: everything the controller reads and writes between ticks
//! - `PositionController`: entry and exit loops over an `Exchange`

pub mod controller;
pub mod state;

pub use controller::{ControllerConfig, PositionController, StepOutcome};
pub use state::{ControllerState, Phase};
