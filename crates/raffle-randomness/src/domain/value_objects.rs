//! # Domain Value Objects
//!
//! Immutable value types for the randomness request lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raffle identifier supplied by the raffle aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaffleId(String);

impl RaffleId {
    /// Wrap a raw identifier. Validation happens at the coordinator boundary.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaffleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RaffleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Supported chain identifiers.
///
/// Source chains own raffles; settlement chains host the oracle consumer
/// contract. Solana is a source chain only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    /// Ethereum mainnet.
    Ethereum,
    /// Polygon PoS.
    Polygon,
    /// Base L2.
    Base,
    /// Arbitrum One.
    Arbitrum,
    /// Solana mainnet.
    Solana,
}

impl ChainId {
    /// All known chains.
    pub const ALL: [ChainId; 5] = [
        ChainId::Ethereum,
        ChainId::Polygon,
        ChainId::Base,
        ChainId::Arbitrum,
        ChainId::Solana,
    ];

    /// Lowercase identifier used in config, logs and contract calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Polygon => "polygon",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Solana => "solana",
        }
    }

    /// Whether the chain speaks the EVM JSON-RPC dialect.
    pub fn is_evm(&self) -> bool {
        !matches!(self, ChainId::Solana)
    }

    /// Block explorer base used for verification links.
    pub fn explorer_base_url(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "https://etherscan.io",
            ChainId::Polygon => "https://polygonscan.com",
            ChainId::Base => "https://basescan.org",
            ChainId::Arbitrum => "https://arbiscan.io",
            ChainId::Solana => "https://solscan.io",
        }
    }

    /// Verification URL for a transaction on this chain.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base_url(), tx_hash)
    }

    /// Left-aligned ASCII encoding used as a `bytes32` contract argument.
    pub fn to_bytes32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let name = self.as_str().as_bytes();
        out[..name.len()].copy_from_slice(name);
        out
    }

    /// Inverse of [`ChainId::to_bytes32`].
    pub fn from_bytes32(bytes: &[u8; 32]) -> Option<Self> {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(32);
        std::str::from_utf8(&bytes[..end])
            .ok()
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(ChainId::Ethereum),
            "polygon" | "matic" => Ok(ChainId::Polygon),
            "base" => Ok(ChainId::Base),
            "arbitrum" | "arb" => Ok(ChainId::Arbitrum),
            "solana" | "sol" => Ok(ChainId::Solana),
            other => Err(format!("unknown chain: {other}")),
        }
    }
}

/// Randomness request state machine.
///
/// ```text
/// Pending ──submit──→ InProgress ──fulfilled──→ Fulfilled ──consumed──→ Completed
///    │                  │    ↑                      ↑
///    │                  │    └── manual re-request ─┤ (back to Pending)
///    └──submit error──→ Failed ──────failsafe───────┘
///                       ↑
///        timeout / retries exhausted (from InProgress)
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Record created, no draw requested yet.
    #[default]
    Pending,
    /// Oracle request submitted, awaiting fulfillment.
    InProgress,
    /// Winning number resolved.
    Fulfilled,
    /// Oracle path failed; failsafe is owed.
    Failed,
    /// Winning number consumed downstream.
    Completed,
}

impl RequestStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::InProgress,
        RequestStatus::Fulfilled,
        RequestStatus::Failed,
        RequestStatus::Completed,
    ];

    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Failed)
                | (Self::InProgress, Self::Fulfilled)
                | (Self::InProgress, Self::Failed)
                | (Self::InProgress, Self::Pending)
                | (Self::Failed, Self::Fulfilled)
                | (Self::Fulfilled, Self::Completed)
        )
    }

    /// Winning number is known.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Completed)
    }

    /// Snake-case label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Fulfilled => "fulfilled",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown request status: {s}"))
    }
}

/// Options for a draw request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOptions {
    /// Submit on the settlement chain on behalf of `source_chain`.
    pub cross_chain: bool,
    /// Chain that logically owns the raffle.
    pub source_chain: ChainId,
}

impl DrawOptions {
    /// Same-chain draw.
    pub fn on_chain(source_chain: ChainId) -> Self {
        Self {
            cross_chain: false,
            source_chain,
        }
    }

    /// Cross-chain draw settled on the registry's settlement chain.
    pub fn cross_chain(source_chain: ChainId) -> Self {
        Self {
            cross_chain: true,
            source_chain,
        }
    }
}

/// Reference to a submitted draw transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    /// Chain the transaction landed on.
    pub chain: ChainId,
    /// Transaction hash.
    pub tx_hash: String,
    /// Oracle request id, when the adapter can read it back immediately.
    pub oracle_request_id: Option<String>,
}

/// Oracle request status read from the consumer contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleStatus {
    /// On-chain oracle request id.
    pub oracle_request_id: String,
    /// Whether the oracle callback has landed.
    pub fulfilled: bool,
    /// Fulfilled value (ticket number), when fulfilled.
    pub value: Option<u64>,
    /// Source chain recorded by the contract.
    pub source_chain: ChainId,
}

/// Block anchoring of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMetadata {
    /// Transaction hash.
    pub tx_hash: String,
    /// Block number containing the transaction.
    pub block_number: u64,
    /// Block hash, when the chain reports one.
    pub block_hash: Option<String>,
    /// Block timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Fee-token balance in raw units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Raw integer amount.
    pub raw: u128,
    /// Token decimals.
    pub decimals: u8,
}

impl TokenBalance {
    /// Build from a whole-token amount.
    pub fn from_tokens(tokens: u64, decimals: u8) -> Self {
        Self {
            raw: tokens as u128 * 10u128.pow(decimals as u32),
            decimals,
        }
    }

    /// Amount in whole tokens.
    pub fn as_tokens(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::InProgress));
        assert!(RequestStatus::InProgress.can_transition_to(RequestStatus::Fulfilled));
        assert!(RequestStatus::Failed.can_transition_to(RequestStatus::Fulfilled));
        assert!(RequestStatus::Fulfilled.can_transition_to(RequestStatus::Completed));
    }

    #[test]
    fn test_status_rejects_backwards_moves() {
        assert!(!RequestStatus::Fulfilled.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Completed.can_transition_to(RequestStatus::Fulfilled));
        assert!(!RequestStatus::Failed.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Fulfilled));
    }

    #[test]
    fn test_status_resolved() {
        assert!(RequestStatus::Fulfilled.is_resolved());
        assert!(RequestStatus::Completed.is_resolved());
        assert!(!RequestStatus::Failed.is_resolved());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "in_progress".parse::<RequestStatus>().unwrap(),
            RequestStatus::InProgress
        );
        assert!("done".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_chain_id_parse_aliases() {
        assert_eq!("SOL".parse::<ChainId>().unwrap(), ChainId::Solana);
        assert_eq!("matic".parse::<ChainId>().unwrap(), ChainId::Polygon);
        assert!("dogecoin".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_chain_id_bytes32_roundtrip() {
        let encoded = ChainId::Solana.to_bytes32();
        assert_eq!(&encoded[..6], b"solana");
        assert_eq!(ChainId::from_bytes32(&encoded), Some(ChainId::Solana));
    }

    #[test]
    fn test_chain_tx_url() {
        assert_eq!(
            ChainId::Polygon.tx_url("0xabc"),
            "https://polygonscan.com/tx/0xabc"
        );
    }

    #[test]
    fn test_token_balance_as_tokens() {
        let balance = TokenBalance::from_tokens(5, 18);
        assert!((balance.as_tokens() - 5.0).abs() < f64::EPSILON);
    }
}
