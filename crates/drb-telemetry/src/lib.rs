//! Structured logging and status reporting.
//!
//! - `init_logging`: tracing subscriber with console and optional file output
//! - `ReportSink`: write-only consumer of the per-tick status snapshot
//! - `ConsoleReporter`: prints the status block to a terminal

pub mod error;
pub mod logging;
pub mod report;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogConfig};
pub use report::{ConsoleReporter, MemorySink, ReportSink, StatusSnapshot};
