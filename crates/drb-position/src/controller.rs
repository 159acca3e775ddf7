//! Entry and exit loops.
//!
//! One `step` per outer tick:
//! 1. Refresh the position from the exchange.
//! 2. Flat: run the entry loop. Buy `target - held` (floored to the lot
//!    step) at `best offer + indent` while `now >= deadline` and the target
//!    is not reached.
//! 3. Long: run the exit loop. Sell the full size at best bid while
//!    `now > deadline` or the last trade is above the ceiling.
//!
//! Every attempt, accepted or not, pushes the deadline to `now + cooldown`
//! measured when the attempt finishes. Any failure ends the loop for this
//! tick; a transport failure also tells the caller the session is gone, and
//! a refused access token tells it to renew the token.

use drb_core::{Clock, OrderId, OrderLabel, OrderSide, Price, SystemClock};
use drb_gateway::{Exchange, GatewayError};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::state::{ControllerState, Phase};

// ============================================================================
// ControllerConfig
// ============================================================================

/// Default offset added to the best offer on entry.
pub const DEFAULT_PRICE_INDENT: i64 = 5;

/// Default wait between an accepted order and the follow-up queries.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Added to the best offer when buying. Not applied on exit.
    pub price_indent: Price,
    /// Wait after an accepted order before reading its state.
    pub settle_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            price_indent: Price::new(DEFAULT_PRICE_INDENT.into()),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

// ============================================================================
// StepOutcome
// ============================================================================

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// Phase after the step.
    pub phase: Phase,
    /// Orders submitted, accepted or rejected. An attempt that stops before
    /// submitting still advances the deadline but is not counted.
    pub orders_sent: u32,
    /// The session was lost during the step.
    pub transport_fault: bool,
    /// The exchange refused the access token.
    pub auth_fault: bool,
}

/// Where an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Position,
    BestOffer,
    BestBid,
    LastTrade,
    Buy,
    Sell,
    OrderState,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Position => "query position",
            Self::BestOffer => "get best offer price",
            Self::BestBid => "get best bid price",
            Self::LastTrade => "get last trade price",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::OrderState => "query order state",
        };
        f.write_str(text)
    }
}

struct Failure {
    stage: Stage,
    error: GatewayError,
}

fn at(stage: Stage) -> impl FnOnce(GatewayError) -> Failure {
    move |error| Failure { stage, error }
}

// ============================================================================
// PositionController
// ============================================================================

/// Drives one instrument's position toward the target and back to flat.
pub struct PositionController<K: Clock = SystemClock> {
    config: ControllerConfig,
    clock: K,
}

impl<K: Clock> PositionController<K> {
    pub fn new(config: ControllerConfig, clock: K) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Run one tick of trading logic against `exchange`.
    pub async fn step<E>(&self, exchange: &mut E, state: &mut ControllerState) -> StepOutcome
    where
        E: Exchange + ?Sized,
    {
        let mut outcome = StepOutcome::default();

        match exchange.get_position().await {
            Ok(position) => state.position = position,
            Err(error) => {
                self.record_failure(state, &mut outcome, Failure {
                    stage: Stage::Position,
                    error,
                });
                outcome.phase = state.phase(self.clock.now());
                return outcome;
            }
        }

        if state.position.is_flat() {
            self.open_position(exchange, state, &mut outcome).await;
        } else if state.position.is_long() {
            self.close_position(exchange, state, &mut outcome).await;
        } else {
            refuse_unmanaged(state);
        }

        outcome.phase = state.phase(self.clock.now());
        outcome
    }

    async fn open_position<E>(&self, exchange: &mut E, state: &mut ControllerState, outcome: &mut StepOutcome)
    where
        E: Exchange + ?Sized,
    {
        loop {
            let now = self.clock.now();
            if !state.window.entry_due(now) {
                debug!(deadline = %state.window.deadline(), "Entry gated by deadline");
                break;
            }
            if state.position.volume >= state.window.target_volume() {
                break;
            }

            let result = self.attempt_entry(exchange, state, outcome).await;
            self.finish_attempt(state);
            if let Err(failure) = result {
                self.record_failure(state, outcome, failure);
                break;
            }
        }
    }

    async fn attempt_entry<E>(
        &self,
        exchange: &mut E,
        state: &mut ControllerState,
        outcome: &mut StepOutcome,
    ) -> Result<(), Failure>
    where
        E: Exchange + ?Sized,
    {
        state.position = exchange.get_position().await.map_err(at(Stage::Position))?;
        let volume = state.window.entry_volume(state.position.volume);
        if volume.is_zero() {
            debug!(held = %state.position.volume, "Nothing left to buy on the lot step");
            return Ok(());
        }

        let offer = exchange.best_offer().await.map_err(at(Stage::BestOffer))?;
        let price = offer + self.config.price_indent;
        let label = OrderLabel::new(OrderSide::Buy);
        info!(%price, %volume, %label, best_offer = %offer, "Placing entry order");

        outcome.orders_sent += 1;
        let order_id = exchange
            .place_buy(price, volume, label)
            .await
            .map_err(at(Stage::Buy))?;
        self.settle(exchange, state, &order_id).await
    }

    async fn close_position<E>(&self, exchange: &mut E, state: &mut ControllerState, outcome: &mut StepOutcome)
    where
        E: Exchange + ?Sized,
    {
        while state.position.is_long() {
            let now = self.clock.now();
            let triggered = if state.window.deadline_passed(now) {
                true
            } else {
                match exchange.last_trade_price().await {
                    Ok(price) => {
                        state.last_trade = Some(price);
                        state.window.ceiling_breached(price)
                    }
                    Err(error) => {
                        self.record_failure(state, outcome, Failure {
                            stage: Stage::LastTrade,
                            error,
                        });
                        break;
                    }
                }
            };
            if !triggered {
                break;
            }

            let result = self.attempt_exit(exchange, state, outcome).await;
            self.finish_attempt(state);
            if let Err(failure) = result {
                self.record_failure(state, outcome, failure);
                break;
            }
        }
    }

    async fn attempt_exit<E>(
        &self,
        exchange: &mut E,
        state: &mut ControllerState,
        outcome: &mut StepOutcome,
    ) -> Result<(), Failure>
    where
        E: Exchange + ?Sized,
    {
        state.position = exchange.get_position().await.map_err(at(Stage::Position))?;
        if state.position.is_flat() {
            return Ok(());
        }
        if !state.position.is_long() {
            refuse_unmanaged(state);
            return Ok(());
        }
        let volume = state.position.volume;

        let bid = exchange.best_bid().await.map_err(at(Stage::BestBid))?;
        let label = OrderLabel::new(OrderSide::Sell);
        info!(price = %bid, %volume, %label, last_trade = ?state.last_trade, "Placing exit order");

        outcome.orders_sent += 1;
        let order_id = exchange
            .place_sell(bid, volume, label)
            .await
            .map_err(at(Stage::Sell))?;
        self.settle(exchange, state, &order_id).await
    }

    /// Wait, log the order's final state and refresh the position.
    async fn settle<E>(&self, exchange: &mut E, state: &mut ControllerState, order_id: &OrderId) -> Result<(), Failure>
    where
        E: Exchange + ?Sized,
    {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        match exchange.get_order_state(order_id).await {
            Ok(order) => info!(
                %order_id,
                state = %order.state,
                side = %order.side,
                filled = %order.filled_amount,
                average_price = ?order.average_price,
                "Order settled"
            ),
            Err(error) if error.is_transport() => {
                return Err(Failure {
                    stage: Stage::OrderState,
                    error,
                })
            }
            Err(error) => warn!(%order_id, %error, "Order state unavailable"),
        }

        state.position = exchange.get_position().await.map_err(at(Stage::Position))?;
        state.status.set_ok();
        info!(
            volume = %state.position.volume,
            direction = %state.position.direction,
            "Position refreshed"
        );
        Ok(())
    }

    fn finish_attempt(&self, state: &mut ControllerState) {
        state.window.advance(self.clock.now());
        debug!(next_deadline = %state.window.deadline(), "Deadline advanced");
    }

    fn record_failure(&self, state: &mut ControllerState, outcome: &mut StepOutcome, failure: Failure) {
        let Failure { stage, error } = failure;
        if error.is_unauthorized() {
            outcome.auth_fault = true;
        }
        if error.is_transport() {
            outcome.transport_fault = true;
            state.connection_ok = false;
            state.status.set("Error: connection error.");
        } else {
            state.status.set(format!("Error: failed to {stage}."));
        }
        warn!(stage = %stage, error = %error, "Attempt failed");
    }
}

/// Only longs are sold down; anything else is reported and left alone.
fn refuse_unmanaged(state: &mut ControllerState) {
    let position = &state.position;
    warn!(volume = %position.volume, direction = %position.direction, "Position not managed");
    state.status.set(format!(
        "Error: {} position of {} is not managed.",
        position.direction, position.volume
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use drb_core::{Direction, ManualClock, Position, TradeWindow, Volume};
    use drb_gateway::{MockCall, MockExchange, MockFailure, MockOp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const COOLDOWN: Duration = Duration::from_secs(60);

    fn px(v: Decimal) -> Price {
        Price::new(v)
    }

    struct Harness {
        clock: Arc<ManualClock>,
        controller: PositionController<Arc<ManualClock>>,
        exchange: MockExchange,
        state: ControllerState,
    }

    fn harness(latency: Duration) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let window = TradeWindow::new(Volume::new(50), px(dec!(30000)), COOLDOWN, clock.now())
            .unwrap();
        let config = ControllerConfig {
            price_indent: px(dec!(5)),
            settle_delay: Duration::ZERO,
        };
        let exchange = MockExchange::new().with_latency(clock.clone(), latency);
        exchange.set_connected(true);
        exchange.set_quotes(Some(px(dec!(29980))), Some(px(dec!(29990))));
        exchange.set_last_trade(Some(px(dec!(29985))));

        Harness {
            controller: PositionController::new(config, clock.clone()),
            clock,
            exchange,
            state: ControllerState::new(window),
        }
    }

    fn count(calls: &[MockCall], wanted: &MockCall) -> usize {
        calls.iter().filter(|c| *c == wanted).count()
    }

    #[tokio::test]
    async fn test_no_entry_before_deadline() {
        let mut h = harness(Duration::ZERO);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 0);
        assert_eq!(outcome.phase, Phase::Idle);
        assert!(h.exchange.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn test_first_entry_crosses_offer_by_indent() {
        let mut h = harness(Duration::ZERO);
        h.clock.advance(COOLDOWN);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        let orders = h.exchange.placed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].price, px(dec!(29995)));
        assert_eq!(orders[0].volume, Volume::new(50));
        assert!(orders[0].label.as_str().starts_with("drb-buy-"));

        assert_eq!(outcome.orders_sent, 1);
        assert_eq!(h.state.position.volume, Volume::new(50));
        assert_eq!(h.state.window.deadline(), h.clock.now() + chrono::Duration::seconds(60));
        assert!(h.state.status.is_ok());
    }

    #[tokio::test]
    async fn test_exit_after_deadline_sells_full_size_at_bid() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_long(50);
        h.exchange.set_quotes(Some(px(dec!(30100))), Some(px(dec!(30110))));
        h.clock.advance(COOLDOWN + Duration::from_secs(1));

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        let orders = h.exchange.placed_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].price, px(dec!(30100)));
        assert_eq!(orders[0].volume, Volume::new(50));
        assert!(h.state.position.is_flat());
        assert_eq!(outcome.phase, Phase::Idle);
        // Time trigger short-circuits the last trade query.
        assert_eq!(count(&h.exchange.calls(), &MockCall::LastTrade), 0);
    }

    #[tokio::test]
    async fn test_order_rejection_skips_refresh_but_advances_deadline() {
        let mut h = harness(Duration::ZERO);
        h.clock.advance(COOLDOWN);
        h.exchange
            .fail_next(MockOp::PlaceOrder, MockFailure::application("not_enough_funds"));

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 1);
        assert!(!outcome.transport_fault);
        // Step refresh and pre-order query only.
        assert_eq!(count(&h.exchange.calls(), &MockCall::GetPosition), 2);
        assert_eq!(
            h.state.window.deadline(),
            h.clock.now() + chrono::Duration::seconds(60)
        );
        assert_eq!(h.state.status.as_str(), "Error: failed to buy.");
        assert!(h.exchange.is_session_live());
    }

    #[tokio::test]
    async fn test_transport_fault_reported() {
        let mut h = harness(Duration::ZERO);
        h.clock.advance(COOLDOWN);
        h.exchange.fail_next(MockOp::BestOffer, MockFailure::Transport);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert!(outcome.transport_fault);
        assert_eq!(outcome.orders_sent, 0);
        assert!(h.exchange.placed_orders().is_empty());
        assert_eq!(h.state.status.as_str(), "Error: connection error.");
        assert!(!h.state.connection_ok);
    }

    #[tokio::test]
    async fn test_position_query_failure_aborts_step() {
        let mut h = harness(Duration::ZERO);
        h.clock.advance(COOLDOWN);
        h.exchange
            .fail_next(MockOp::GetPosition, MockFailure::application("internal"));

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 0);
        assert!(h.exchange.placed_orders().is_empty());
        assert_eq!(h.state.status.as_str(), "Error: failed to query position.");
    }

    #[tokio::test]
    async fn test_ceiling_breach_triggers_exit_before_deadline() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_long(50);
        h.exchange.set_last_trade(Some(px(dec!(30050))));

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 1);
        let orders = h.exchange.placed_orders();
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].price, px(dec!(29980)));
        assert!(h.state.position.is_flat());
    }

    #[tokio::test]
    async fn test_holding_below_ceiling_before_deadline_waits() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_long(50);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 0);
        assert_eq!(outcome.phase, Phase::Holding);
        assert_eq!(h.state.last_trade, Some(px(dec!(29985))));
    }

    #[tokio::test]
    async fn test_exit_completes_once_triggered() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_long(50);
        h.exchange.set_last_trade(Some(px(dec!(31000))));

        for _ in 0..3 {
            h.controller.step(&mut h.exchange, &mut h.state).await;
            h.clock.advance(Duration::from_secs(5));
        }

        let sells = h
            .exchange
            .placed_orders()
            .into_iter()
            .filter(|o| o.side == OrderSide::Sell)
            .count();
        assert!(sells >= 1);
        assert!(h.exchange.position().is_flat());
    }

    #[tokio::test]
    async fn test_short_position_left_alone() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_position(Position {
            volume: Volume::new(30),
            direction: Direction::Short,
            ..Position::default()
        });
        h.clock.advance(COOLDOWN * 2);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert_eq!(outcome.orders_sent, 0);
        assert!(h.exchange.placed_orders().is_empty());
        assert!(!h.state.status.is_ok());
    }

    #[tokio::test]
    async fn test_attempts_spaced_by_cooldown_under_latency() {
        // Slow venue: every call costs 7 seconds.
        let mut h = harness(Duration::from_secs(7));

        for _ in 0..200 {
            h.controller.step(&mut h.exchange, &mut h.state).await;
            h.clock.advance(Duration::from_secs(5));
        }

        let times: Vec<DateTime<Utc>> = h.exchange.order_times();
        assert!(times.len() >= 4, "expected several round trips, got {}", times.len());
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= chrono::Duration::seconds(60));
        }
    }

    #[tokio::test]
    async fn test_buy_volume_never_exceeds_remaining_target() {
        let mut h = harness(Duration::ZERO);

        for _ in 0..100 {
            let held = h.exchange.position().volume.get();
            let before = h.exchange.placed_orders().len();
            h.controller.step(&mut h.exchange, &mut h.state).await;
            for order in &h.exchange.placed_orders()[before..] {
                if order.side == OrderSide::Buy {
                    assert!(order.volume.get() <= 50 - held);
                    assert!(order.volume.is_lot_multiple());
                }
            }
            h.clock.advance(Duration::from_secs(5));
        }
    }

    fn long(volume: u64) -> Position {
        Position {
            volume: Volume::new(volume),
            direction: Direction::Long,
            ..Position::default()
        }
    }

    #[tokio::test]
    async fn test_exit_stops_when_requery_shows_short() {
        let mut h = harness(Duration::ZERO);
        h.exchange.set_long(50);
        h.exchange.queue_position(long(50));
        h.exchange.queue_position(Position {
            volume: Volume::new(30),
            direction: Direction::Short,
            ..Position::default()
        });
        h.clock.advance(COOLDOWN + Duration::from_secs(1));

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert!(h.exchange.placed_orders().is_empty());
        assert_eq!(outcome.orders_sent, 0);
        assert_eq!(h.state.position.direction, Direction::Short);
        assert_eq!(
            h.state.status.as_str(),
            "Error: short position of 30 is not managed."
        );
    }

    #[tokio::test]
    async fn test_sub_lot_remainder_sends_nothing_but_advances_deadline() {
        let mut h = harness(Duration::ZERO);
        h.exchange.queue_position(Position::flat());
        h.exchange.queue_position(long(45));
        h.clock.advance(COOLDOWN);

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert!(h.exchange.placed_orders().is_empty());
        assert_eq!(outcome.orders_sent, 0);
        assert_eq!(outcome.phase, Phase::Opening);
        assert_eq!(
            h.state.window.deadline(),
            h.clock.now() + chrono::Duration::seconds(60)
        );
    }

    #[tokio::test]
    async fn test_refused_token_flagged() {
        let mut h = harness(Duration::ZERO);
        h.clock.advance(COOLDOWN);
        h.exchange.expire_token();

        let outcome = h.controller.step(&mut h.exchange, &mut h.state).await;

        assert!(outcome.auth_fault);
        assert!(!outcome.transport_fault);
        assert!(h.exchange.placed_orders().is_empty());
        assert_eq!(h.state.status.as_str(), "Error: failed to query position.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_then_order_state_then_refresh() {
        let mut h = harness(Duration::ZERO);
        let controller = PositionController::new(
            ControllerConfig {
                price_indent: px(dec!(5)),
                settle_delay: Duration::from_secs(5),
            },
            h.clock.clone(),
        );
        h.clock.advance(COOLDOWN);

        controller.step(&mut h.exchange, &mut h.state).await;

        let calls = h.exchange.calls();
        let placed = calls
            .iter()
            .position(|c| matches!(c, MockCall::PlaceOrder(_)))
            .unwrap();
        assert!(matches!(calls[placed + 1], MockCall::GetOrderState(_)));
        assert_eq!(calls[placed + 2], MockCall::GetPosition);
    }
}
