//! # Failsafe Randomness
//!
//! Local draws used when the oracle path fails. Draws come from the OS CSPRNG
//! and never touch the network, so the failsafe cannot itself fail on I/O.

use super::seed_expansion::{self, ExpansionVerification};
use crate::domain::{validate_range, FailsafeDraw, RandomnessResult};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use uuid::Uuid;

/// Provenance prefix recorded as the request id of failsafe resolutions.
pub const FAILSAFE_PROVENANCE_PREFIX: &str = "failsafe-";

/// Cryptographically secure local randomness.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailsafeRandomnessProvider;

impl FailsafeRandomnessProvider {
    /// Create a provider.
    pub fn new() -> Self {
        Self
    }

    /// Uniform integer in `[1, range]`.
    pub fn draw_uniform(&self, range: u64, now: DateTime<Utc>) -> RandomnessResult<FailsafeDraw> {
        validate_range(range)?;
        let value = OsRng.gen_range(1..=range);
        Ok(FailsafeDraw {
            value,
            range,
            provenance: format!("{FAILSAFE_PROVENANCE_PREFIX}{}", Uuid::new_v4()),
            drawn_at: now,
        })
    }

    /// Deterministic per-round values from a verified seed.
    pub fn expand_seed(&self, seed: &[u8], rounds: u32) -> RandomnessResult<Vec<f64>> {
        seed_expansion::expand_seed(seed, rounds)
    }

    /// Re-derive one round and compare it with a claimed value.
    pub fn verify_expansion(
        &self,
        seed: &[u8],
        rounds: u32,
        round_index: u32,
        claimed: f64,
    ) -> ExpansionVerification {
        seed_expansion::verify_expansion(seed, rounds, round_index, claimed)
    }
}

/// Request id was produced by the failsafe provider.
pub fn is_failsafe_provenance(request_id: &str) -> bool {
    request_id.starts_with(FAILSAFE_PROVENANCE_PREFIX)
}
