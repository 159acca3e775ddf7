//! Liveness probing for the live transport.
//!
//! Sends a WebSocket ping and waits a bounded time for the matching pong.
//! The monitor only reports; dropping the session on failure is the
//! connection manager's job.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{WsError, WsResult};
use crate::transport::Transport;

/// Bounded ping/pong prober.
#[derive(Debug)]
pub struct LivenessMonitor {
    /// How long to wait for the pong.
    timeout: Duration,
    /// Payload sequence, so a late pong from an earlier probe never counts.
    seq: u64,
    consecutive_failures: u32,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            seq: 0,
            consecutive_failures: 0,
        }
    }

    /// Probe `transport`. Returns the round-trip time on success.
    ///
    /// Any error, including the timeout, means the transport is dead.
    pub async fn probe(&mut self, transport: &mut dyn Transport) -> WsResult<Duration> {
        self.seq = self.seq.wrapping_add(1);
        let payload = self.seq.to_be_bytes().to_vec();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, transport.ping(payload)).await {
            Ok(result) => result,
            Err(_) => Err(WsError::LivenessTimeout(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(()) => {
                let rtt = started.elapsed();
                self.consecutive_failures = 0;
                debug!(rtt_ms = rtt.as_millis() as u64, "Liveness probe ok");
                Ok(rtt)
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "Liveness probe failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PingReply, ScriptedTransport};

    #[tokio::test]
    async fn test_probe_ok() {
        let mut monitor = LivenessMonitor::new(Duration::from_secs(1));
        let mut transport = ScriptedTransport::new(vec![]).with_pings(vec![PingReply::Pong]);

        let rtt = monitor.probe(&mut transport).await.unwrap();
        assert!(rtt < Duration::from_secs(1));
        assert_eq!(monitor.seq, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_times_out() {
        let mut monitor = LivenessMonitor::new(Duration::from_millis(1000));
        let mut transport = ScriptedTransport::new(vec![]).with_pings(vec![PingReply::Silent]);

        let err = monitor.probe(&mut transport).await.unwrap_err();

        assert!(matches!(err, WsError::LivenessTimeout(1000)));
        assert_eq!(monitor.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_failures_reset_on_success() {
        let mut monitor = LivenessMonitor::new(Duration::from_secs(1));
        let mut transport = ScriptedTransport::new(vec![])
            .with_pings(vec![PingReply::Closed, PingReply::Closed, PingReply::Pong]);

        assert!(monitor.probe(&mut transport).await.is_err());
        assert!(monitor.probe(&mut transport).await.is_err());
        assert_eq!(monitor.consecutive_failures, 2);
        assert!(monitor.probe(&mut transport).await.is_ok());
        assert_eq!(monitor.consecutive_failures, 0);
    }
}
