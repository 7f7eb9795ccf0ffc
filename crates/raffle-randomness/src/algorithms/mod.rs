//! # Algorithms
//!
//! Pure randomness routines with no chain dependency.

pub mod failsafe;
pub mod seed_expansion;

pub use failsafe::{is_failsafe_provenance, FailsafeRandomnessProvider, FAILSAFE_PROVENANCE_PREFIX};
pub use seed_expansion::{
    expand_seed, expansion_value, seed_from_hex, seed_from_random_value, verify_expansion,
    ExpansionVerification, EXPANSION_TOLERANCE, MAX_EXPANSION_ROUNDS,
};
