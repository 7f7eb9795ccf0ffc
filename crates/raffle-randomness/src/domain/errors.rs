//! # Domain Errors
//!
//! Error taxonomy for the randomness lifecycle.
//!
//! Only [`RandomnessError::Validation`] is surfaced to callers as a hard
//! failure. Everything else is absorbed into record transitions and alerts.

use super::value_objects::{ChainId, RaffleId, RequestStatus};
use std::time::Duration;
use thiserror::Error;

/// Faults reported by a chain adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Transport or node error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Call exceeded its time budget.
    #[error("Chain call timed out after {0:?}")]
    Timeout(Duration),

    /// Contract already holds a request for this raffle.
    #[error("Draw already requested on chain (oracle request {0})")]
    AlreadyRequested(String),

    /// Contract already fulfilled this raffle.
    #[error("Draw already fulfilled on chain")]
    AlreadyFulfilled,

    /// No oracle request is mapped to the raffle.
    #[error("No oracle request for raffle {0}")]
    RequestNotFound(String),

    /// Response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Adapter does not serve this chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),
}

/// Storage faults from the raffle record repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// A record already exists for this raffle.
    #[error("Record already exists for raffle {0}")]
    AlreadyExists(RaffleId),

    /// Backend failure.
    #[error("Repository backend error: {0}")]
    Backend(String),
}

/// Randomness lifecycle errors.
#[derive(Debug, Error)]
pub enum RandomnessError {
    /// Bad raffle id or non-positive range. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No record for this raffle.
    #[error("Raffle not found: {0}")]
    RaffleNotFound(RaffleId),

    /// Idempotency guard: a draw may only be requested from Pending.
    #[error("Draw already requested for raffle {raffle_id} (status {status})")]
    AlreadyRequested {
        /// Raffle
        raffle_id: RaffleId,
        /// Status observed by the guard
        status: RequestStatus,
    },

    /// Raffle already has a winning number.
    #[error("Raffle {raffle_id} already resolved with winning number {winning_number}")]
    AlreadyResolved {
        /// Raffle
        raffle_id: RaffleId,
        /// Existing result
        winning_number: u64,
    },

    /// Illegal state machine move.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: RequestStatus,
        /// Attempted state
        to: RequestStatus,
    },

    /// Adapter could not submit the draw. Falls back to failsafe.
    #[error("Submission failed on {chain}: {source}")]
    Submission {
        /// Chain the submission targeted
        chain: ChainId,
        /// Adapter fault
        #[source]
        source: ChainError,
    },

    /// Status or balance read failed. Retried up to the configured budget.
    #[error("Query failed on {chain} (attempt {attempt}): {source}")]
    Query {
        /// Chain queried
        chain: ChainId,
        /// Failed attempts so far
        attempt: u32,
        /// Adapter fault
        #[source]
        source: ChainError,
    },

    /// No fulfillment within the staleness threshold.
    #[error("Request for raffle {raffle_id} stale after {elapsed_secs}s")]
    Timeout {
        /// Raffle
        raffle_id: RaffleId,
        /// Age of the request
        elapsed_secs: i64,
    },

    /// Oracle fee balance below threshold. Alert only.
    #[error("Insufficient oracle fee balance: {balance} < {threshold}")]
    InsufficientFunds {
        /// Current balance in whole tokens
        balance: f64,
        /// Configured threshold in whole tokens
        threshold: f64,
    },

    /// Stored value differs from the chain. Reported, never corrected.
    #[error("Verification mismatch for raffle {raffle_id}: stored {stored}, on-chain {on_chain}")]
    VerificationMismatch {
        /// Raffle
        raffle_id: RaffleId,
        /// Stored winning number
        stored: u64,
        /// Value reported by the chain
        on_chain: u64,
    },

    /// Chain fulfilled the raffle under a different oracle request than the one stored.
    #[error("Oracle request mismatch for raffle {raffle_id}: stored {stored}, on-chain {on_chain}")]
    RequestMismatch {
        /// Raffle
        raffle_id: RaffleId,
        /// Stored oracle request id
        stored: String,
        /// Request id reported by the chain
        on_chain: String,
    },

    /// No adapter registered for the chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(ChainId),

    /// Compare-and-set kept losing races.
    #[error("Concurrent modification of raffle {raffle_id} after {attempts} attempts")]
    ConcurrentModification {
        /// Raffle
        raffle_id: RaffleId,
        /// Attempts made
        attempts: u32,
    },

    /// Storage fault.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RandomnessError {
    /// Hard failures the immediate caller must see.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RaffleNotFound(_) => "not_found",
            Self::AlreadyRequested { .. } => "already_requested",
            Self::AlreadyResolved { .. } => "already_resolved",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Submission { .. } => "submission",
            Self::Query { .. } => "query",
            Self::Timeout { .. } => "timeout",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::VerificationMismatch { .. } | Self::RequestMismatch { .. } => "verification_mismatch",
            Self::UnsupportedChain(_) => "unsupported_chain",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Repository(_) => "repository",
        }
    }
}

/// Result type for randomness operations.
pub type RandomnessResult<T> = Result<T, RandomnessError>;
