//! Main application loop.
//!
//! Each tick:
//! 1. Make sure a session exists (connect + authenticate if not)
//! 2. Probe it; a failed probe drops it and skips trading for this tick
//! 3. Hand over to the position controller
//! 4. Renew the access token if the exchange refused it
//! 5. Report a status snapshot
//!
//! Then sleep for the iteration interval. Ctrl-C ends the loop and closes the
//! session.

use drb_core::{Clock, SystemClock};
use drb_gateway::Exchange;
use drb_position::{ControllerState, PositionController, StepOutcome};
use drb_telemetry::{ReportSink, StatusSnapshot};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AppResult;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session could be established.
    ConnectFailed,
    /// The liveness probe failed; the session was dropped.
    ProbeFailed,
    /// Trading logic ran.
    Stepped(StepOutcome),
}

/// Main application.
pub struct Application<E, S, K = SystemClock>
where
    E: Exchange,
    S: ReportSink,
    K: Clock,
{
    exchange: E,
    sink: S,
    controller: PositionController<K>,
    state: ControllerState,
    interval: Duration,
    ticks: u64,
}

impl<E, S, K> Application<E, S, K>
where
    E: Exchange,
    S: ReportSink,
    K: Clock,
{
    pub fn new(
        exchange: E,
        sink: S,
        controller: PositionController<K>,
        state: ControllerState,
        interval: Duration,
    ) -> Self {
        Self {
            exchange,
            sink,
            controller,
            state,
            interval,
            ticks: 0,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Run until Ctrl-C.
    pub async fn run(&mut self) -> AppResult<()> {
        info!(
            target_volume = %self.state.window.target_volume(),
            price_ceiling = %self.state.window.price_ceiling(),
            first_deadline = %self.state.window.deadline(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting main loop"
        );
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
        Ok(())
    }

    /// Run until `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = self.tick_and_wait() => {}
            }
        }

        self.exchange.close().await;
        info!(ticks = self.ticks, "Shutting down");
    }

    async fn tick_and_wait(&mut self) {
        self.tick().await;
        tokio::time::sleep(self.interval).await;
    }

    /// One pass of connect, probe, trade and report.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        let outcome = self.connect_and_trade().await;
        self.report();
        debug!(tick = self.ticks, ?outcome, "Tick complete");
        outcome
    }

    async fn connect_and_trade(&mut self) -> TickOutcome {
        let was_connected = self.exchange.is_connected();
        if let Err(e) = self.exchange.ensure_connected().await {
            warn!(error = %e, "Connection error");
            self.state.connection_ok = false;
            self.state.status.set("Error: connection error.");
            return TickOutcome::ConnectFailed;
        }
        if !was_connected {
            info!("Session established");
        }

        match self.exchange.probe().await {
            Ok(rtt) => {
                debug!(rtt_ms = rtt.as_millis() as u64, "Liveness ok");
                if !self.state.connection_ok {
                    self.state.status.set_ok();
                }
                self.state.connection_ok = true;
            }
            Err(e) => {
                warn!(error = %e, "Exchange server is not answering pings");
                self.state.connection_ok = false;
                self.state
                    .status
                    .set("Error: exchange server is not answering pings.");
                return TickOutcome::ProbeFailed;
            }
        }

        let step = self
            .controller
            .step(&mut self.exchange, &mut self.state)
            .await;
        if step.auth_fault {
            self.renew_token().await;
        }
        TickOutcome::Stepped(step)
    }

    async fn renew_token(&mut self) {
        match self.exchange.authenticate().await {
            Ok(()) => info!("Access token renewed after refusal"),
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Connection lost while renewing access token");
                self.state.connection_ok = false;
                self.state.status.set("Error: connection error.");
            }
            Err(e) => warn!(error = %e, "Access token renewal failed"),
        }
    }

    fn report(&mut self) {
        let position = &self.state.position;
        let snapshot = StatusSnapshot {
            connection_ok: self.state.connection_ok,
            position_volume: position.volume,
            position_direction: position.direction,
            unrealized_pnl: position.unrealized_pnl,
            total_pnl: position.total_pnl,
            status_info: self.state.status.as_str().to_string(),
        };
        self.sink.report(&snapshot);
    }
}
