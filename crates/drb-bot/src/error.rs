//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load failed: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Core(#[from] drb_core::CoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] drb_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
