//! # Integration Tests
//!
//! Cross-component flows over simulated chains.

pub mod concurrency;
pub mod lifecycle_properties;
pub mod scenarios;
