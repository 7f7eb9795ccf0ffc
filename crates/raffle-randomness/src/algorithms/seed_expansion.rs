//! # Seed Expansion
//!
//! Derives per-round values for session games from one verified seed.
//!
//! Round `i` is `SHA-256(seed ‖ i_be32)`, with the first 8 digest bytes mapped
//! onto `[0, 1)`. Each round depends only on `(seed, i)`, so any single round
//! can be re-derived and checked in isolation.

use crate::domain::{RandomnessError, RandomnessResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Absolute tolerance for comparing a claimed round value.
pub const EXPANSION_TOLERANCE: f64 = 1e-9;

/// Upper bound on rounds expanded from one seed.
pub const MAX_EXPANSION_ROUNDS: u32 = 10_000;

/// 2^53: the f64 mantissa width.
const MANTISSA_SCALE: f64 = (1u64 << 53) as f64;

/// Outcome of re-deriving one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpansionVerification {
    /// Round checked.
    pub round_index: u32,
    /// Claimed value matches the derivation.
    pub valid: bool,
    /// Derived value, absent when the round is out of bounds.
    pub expected: Option<f64>,
    /// Value presented for checking.
    pub claimed: f64,
    /// Why the check failed, if it did.
    pub reason: Option<String>,
}

/// Value for a single round.
pub fn expansion_value(seed: &[u8], round_index: u32) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(round_index.to_be_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) >> 11) as f64 / MANTISSA_SCALE
}

/// Expand `seed` into `rounds` values in `[0, 1)`.
pub fn expand_seed(seed: &[u8], rounds: u32) -> RandomnessResult<Vec<f64>> {
    validate_session(seed, rounds)?;
    Ok((0..rounds).map(|i| expansion_value(seed, i)).collect())
}

/// Re-derive round `round_index` and compare with `claimed`.
pub fn verify_expansion(
    seed: &[u8],
    rounds: u32,
    round_index: u32,
    claimed: f64,
) -> ExpansionVerification {
    let rejected = |reason: String| ExpansionVerification {
        round_index,
        valid: false,
        expected: None,
        claimed,
        reason: Some(reason),
    };

    if let Err(err) = validate_session(seed, rounds) {
        return rejected(err.to_string());
    }
    if round_index >= rounds {
        return rejected(format!("round {round_index} outside session of {rounds} rounds"));
    }

    let expected = expansion_value(seed, round_index);
    let valid = claimed.is_finite() && (expected - claimed).abs() <= EXPANSION_TOLERANCE;
    ExpansionVerification {
        round_index,
        valid,
        expected: Some(expected),
        claimed,
        reason: (!valid).then(|| "claimed value does not match derivation".to_string()),
    }
}

/// Seed bytes from a fulfilled oracle value.
pub fn seed_from_random_value(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Seed bytes from a hex string, with or without `0x`.
pub fn seed_from_hex(seed: &str) -> RandomnessResult<Vec<u8>> {
    let trimmed = seed.strip_prefix("0x").unwrap_or(seed);
    hex::decode(trimmed).map_err(|e| RandomnessError::Validation(format!("invalid hex seed: {e}")))
}

/// Inputs `expand_seed` would refuse are never valid to verify against.
fn validate_session(seed: &[u8], rounds: u32) -> RandomnessResult<()> {
    if seed.is_empty() {
        return Err(RandomnessError::Validation("seed is empty".into()));
    }
    if rounds == 0 {
        return Err(RandomnessError::Validation("rounds must be positive".into()));
    }
    if rounds > MAX_EXPANSION_ROUNDS {
        return Err(RandomnessError::Validation(format!(
            "rounds {rounds} exceeds maximum {MAX_EXPANSION_ROUNDS}"
        )));
    }
    Ok(())
}
