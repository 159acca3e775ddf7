//! Deribit position robot.
//!
//! Wires the pieces together:
//! - Configuration (TOML file + environment overrides)
//! - Startup prompts for target volume and price ceiling
//! - The outer tick loop: connect, probe, trade, report

pub mod app;
pub mod config;
pub mod error;
pub mod input;

pub use app::{Application, TickOutcome};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use input::UserInput;
