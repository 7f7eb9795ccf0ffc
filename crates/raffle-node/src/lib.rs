//! # Raffle Node
//!
//! Executable wiring for the randomness lifecycle.
//!
//! The node has no network-facing API of its own. Raffle services embed it
//! as a library: [`RandomnessNode::build`] hands back the coordinator (the
//! [`raffle_randomness::RandomnessApi`] the raffle aggregate calls when an
//! entry window closes) and the [`raffle_randomness::AdminService`] an
//! operator surface mounts. The `raffle-node` binary wires the same node and
//! only runs the background monitor, for deployments where draws are
//! driven by another process sharing the record store.
//!
//! ## Startup Sequence
//!
//! 1. Initialize tracing from `RAFFLE_*` telemetry variables
//! 2. Load [`config::NodeConfig`] from the environment
//! 3. Register chain adapters (JSON-RPC, or simulated when no RPC url is set)
//! 4. Wire coordinator, monitor and admin surface
//! 5. Start the monitor jobs and wait for Ctrl+C

pub mod config;
pub mod wiring;

pub use config::{ConfigError, NodeConfig, RpcConfig};
pub use wiring::{RandomnessNode, WiringError};
