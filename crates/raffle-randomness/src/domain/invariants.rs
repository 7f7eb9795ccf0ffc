//! # Domain Invariants
//!
//! Business rules checked at the coordinator boundary and by the verifier.

use super::entities::RandomnessRequestRecord;
use super::errors::{RandomnessError, RandomnessResult};
use super::value_objects::{RaffleId, RequestStatus};

/// Longest accepted raffle identifier.
pub const MAX_RAFFLE_ID_LEN: usize = 128;

/// Raffle ids are non-empty, bounded, and free of whitespace/control characters.
pub fn validate_raffle_id(raffle_id: &RaffleId) -> RandomnessResult<()> {
    let id = raffle_id.as_str();
    if id.is_empty() {
        return Err(RandomnessError::Validation("raffle id is empty".into()));
    }
    if id.len() > MAX_RAFFLE_ID_LEN {
        return Err(RandomnessError::Validation(format!(
            "raffle id longer than {MAX_RAFFLE_ID_LEN} bytes"
        )));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RandomnessError::Validation(format!(
            "raffle id {id:?} contains whitespace or control characters"
        )));
    }
    Ok(())
}

/// Draw range must be a positive integer.
pub fn validate_range(range: u64) -> RandomnessResult<()> {
    if range == 0 {
        return Err(RandomnessError::Validation(
            "draw range must be a positive integer".into(),
        ));
    }
    Ok(())
}

/// A new request may only be issued from Pending.
pub fn invariant_request_requires_pending(record: &RandomnessRequestRecord) -> RandomnessResult<()> {
    if record.status != RequestStatus::Pending {
        return Err(RandomnessError::AlreadyRequested {
            raffle_id: record.raffle_id.clone(),
            status: record.status,
        });
    }
    Ok(())
}

/// Winning number lies in `[1, range]`.
pub fn invariant_winning_number_in_range(value: u64, range: u64) -> bool {
    (1..=range).contains(&value)
}

/// `failsafe_used` ⇔ no on-chain transaction hash, for resolved records.
pub fn invariant_failsafe_has_no_tx_hash(record: &RandomnessRequestRecord) -> bool {
    if !record.is_resolved() {
        return true;
    }
    record.failsafe_used == record.transaction_hash.is_none()
}

/// Resolved records carry a winning number within their recorded range.
pub fn invariant_resolved_record_in_range(record: &RandomnessRequestRecord) -> bool {
    if !record.is_resolved() {
        return true;
    }
    match (record.winning_number, record.range) {
        (Some(value), Some(range)) => invariant_winning_number_in_range(value, range),
        _ => false,
    }
}
