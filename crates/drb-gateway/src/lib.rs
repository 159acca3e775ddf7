//! Order gateway for the Deribit position robot.
//!
//! The `Exchange` trait is the seam between the position controller and the
//! venue. `DeribitGateway` implements it over the JSON-RPC session layer;
//! `MockExchange` is an in-memory venue for tests.

pub mod deribit;
pub mod error;
pub mod exchange;
pub mod mock;
pub mod wire;

pub use deribit::{DeribitGateway, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use exchange::Exchange;
pub use mock::{MockCall, MockExchange, MockFailure, MockOp};
pub use drb_ws::BoxFuture;
