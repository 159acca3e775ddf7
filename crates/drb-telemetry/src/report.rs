//! Per-tick status reporting.
//!
//! The sink only receives; nothing it does feeds back into trading.

use drb_core::{Direction, Volume};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

/// ANSI: clear screen, cursor home.
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Snapshot handed to the sink once per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub connection_ok: bool,
    pub position_volume: Volume,
    pub position_direction: Direction,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub status_info: String,
}

/// Write-only consumer of status snapshots.
pub trait ReportSink: Send {
    fn report(&mut self, snapshot: &StatusSnapshot);
}

/// Prints the status block to a terminal.
pub struct ConsoleReporter<W: Write + Send = io::Stdout> {
    out: W,
    clear_console: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(clear_console: bool) -> Self {
        Self::new(io::stdout(), clear_console)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, clear_console: bool) -> Self {
        Self { out, clear_console }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render the six-line block.
    pub fn render(snapshot: &StatusSnapshot) -> String {
        let connection = if snapshot.connection_ok {
            "OK"
        } else {
            "DISCONNECTED"
        };
        format!(
            "\nConnection:                 {connection}\n\
             Position volume:            {}\n\
             Position direction:         {}\n\
             Position unrealized profit: {}\n\
             Total profit:               {}\n\
             Status info:                {}\n",
            snapshot.position_volume,
            snapshot.position_direction,
            snapshot.unrealized_pnl,
            snapshot.total_pnl,
            snapshot.status_info,
        )
    }

    fn write_block(&mut self, snapshot: &StatusSnapshot) -> io::Result<()> {
        if self.clear_console {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(Self::render(snapshot).as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write + Send> ReportSink for ConsoleReporter<W> {
    fn report(&mut self, snapshot: &StatusSnapshot) {
        if let Err(e) = self.write_block(snapshot) {
            debug!(error = %e, "Status block not written");
        }
    }
}

/// Sink that keeps every snapshot in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    snapshots: Arc<Mutex<Vec<StatusSnapshot>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn last(&self) -> Option<StatusSnapshot> {
        self.snapshots.lock().last().cloned()
    }
}

impl ReportSink for MemorySink {
    fn report(&mut self, snapshot: &StatusSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }
}
