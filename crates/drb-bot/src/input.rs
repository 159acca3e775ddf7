//! Startup parameter entry.
//!
//! Target volume and price ceiling are asked for once. Malformed answers are
//! re-prompted, never defaulted. Values given on the command line skip the
//! prompt but must pass the same checks.

use drb_core::{Price, Volume, LOT_STEP};
use std::io::{BufRead, Write};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// The two values that drive the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInput {
    pub target_volume: Volume,
    pub price_ceiling: Price,
}

/// Resolve both values from CLI arguments or interactive prompts.
pub fn collect<R, W>(
    volume_arg: Option<&str>,
    ceiling_arg: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> AppResult<UserInput>
where
    R: BufRead,
    W: Write,
{
    let target_volume = match volume_arg {
        Some(raw) => Volume::parse_target(raw).map_err(|e| AppError::Input(e.to_string()))?,
        None => prompt(input, output, "Enter position volume: ", |line| {
            Volume::parse_target(line).map_err(|_| {
                format!("Volume must be a whole number that is a multiple of {LOT_STEP}, try again.")
            })
        })?,
    };

    let price_ceiling = match ceiling_arg {
        Some(raw) => Price::parse_positive(raw).map_err(|e| AppError::Input(e.to_string()))?,
        None => prompt(input, output, "Enter price ceiling: ", |line| {
            Price::parse_positive(line)
                .map_err(|_| "Price must be a positive number, try again.".to_string())
        })?,
    };

    info!(%target_volume, %price_ceiling, "Trading parameters set");
    Ok(UserInput {
        target_volume,
        price_ceiling,
    })
}

/// Ask until `parse` accepts a line. End of input is an error.
fn prompt<R, W, T, F>(input: &mut R, output: &mut W, question: &str, parse: F) -> AppResult<T>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Result<T, String>,
{
    let mut line = String::new();
    loop {
        write!(output, "{question}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(AppError::Input(format!(
                "input closed while waiting for: {}",
                question.trim_end_matches([':', ' '])
            )));
        }

        match parse(line.trim()) {
            Ok(value) => return Ok(value),
            Err(message) => {
                warn!(input = %line.trim(), "Input rejected");
                writeln!(output, "{message}")?;
            }
        }
    }
}
