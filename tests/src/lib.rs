//! # Raffle Randomness Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (failsafe draw, seed expansion)
//! └── src/
//!     ├── harness.rs    # Simulated chains + in-memory wiring
//!     └── integration/  # Scenarios A-D, lifecycle properties, concurrency
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p raffle-tests
//!
//! # By category
//! cargo test -p raffle-tests integration::scenarios::
//! cargo test -p raffle-tests integration::concurrency::
//!
//! # Benchmarks
//! cargo bench -p raffle-tests
//! ```

pub mod harness;
pub mod integration;
