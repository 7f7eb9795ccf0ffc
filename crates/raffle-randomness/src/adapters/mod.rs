//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: chain gateways, record storage,
//! alert delivery and time.

mod alerts;
mod clock;
pub mod json_rpc;
mod registry;
mod repository;
mod simulated_chain;

pub use alerts::{FanoutAlertSink, RecordingAlertSink, TracingAlertSink};
pub use clock::{ManualClock, SystemClock};
pub use json_rpc::{JsonRpcChainAdapter, JsonRpcEndpoint};
pub use registry::ChainAdapterRegistry;
pub use repository::InMemoryRaffleRepository;
pub use simulated_chain::SimulatedChainAdapter;
