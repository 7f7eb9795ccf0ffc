//! Simulated Chain Adapter
//!
//! In-process consumer contract with deterministic block production,
//! scripted fulfillment and fault injection. Backs the test suite and the
//! node's development mode.

use crate::domain::{
    ChainError, ChainId, DrawOptions, OracleRequestParams, OracleStatus, RaffleId, TokenBalance,
    TxMetadata, TxRef,
};
use crate::ports::outbound::ChainAdapter;
use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const GENESIS_TIMESTAMP: i64 = 1_700_000_000;
const BLOCK_TIME_SECS: i64 = 12;
const DEFAULT_DECIMALS: u8 = 18;

/// Oracle request held by the simulated contract.
#[derive(Clone, Debug)]
struct SimRequest {
    oracle_request_id: u64,
    source_chain: ChainId,
    range: u64,
    value: Option<u64>,
    params: OracleRequestParams,
}

/// Injected faults.
#[derive(Clone, Debug, Default)]
struct Faults {
    /// Fail the next N calls of any kind.
    any_calls: u32,
    /// Fail the next N submissions.
    submissions: u32,
    /// Fail the next N status queries.
    queries: u32,
    /// Every call blocks forever.
    hang: bool,
    /// Next submission reports an existing request.
    duplicate_next: bool,
}

#[derive(Default)]
struct SimState {
    height: u64,
    next_request_id: u64,
    requests: HashMap<RaffleId, SimRequest>,
    scripted: HashMap<RaffleId, u64>,
    txs: HashMap<String, TxMetadata>,
    balances: HashMap<String, TokenBalance>,
    faults: Faults,
    submissions: usize,
    contract_reachable: bool,
    subscription_active: bool,
    cancelled_subscriptions: HashSet<u64>,
}

/// Simulated settlement chain.
pub struct SimulatedChainAdapter {
    chain: ChainId,
    state: RwLock<SimState>,
}

impl SimulatedChainAdapter {
    /// Healthy chain at height 1 with an empty contract.
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            state: RwLock::new(SimState {
                height: 1,
                next_request_id: 1,
                contract_reachable: true,
                subscription_active: true,
                ..Default::default()
            }),
        }
    }

    /// Oracle value delivered as soon as the raffle's request is submitted.
    pub fn script_fulfillment(&self, raffle_id: &RaffleId, value: u64) {
        self.state.write().scripted.insert(raffle_id.clone(), value);
    }

    /// Deliver the oracle callback for a submitted request. Returns `false`
    /// when no request exists for the raffle.
    pub fn fulfill(&self, raffle_id: &RaffleId, value: u64) -> bool {
        let mut state = self.state.write();
        state.height += 1;
        match state.requests.get_mut(raffle_id) {
            Some(request) => {
                request.value = Some(value);
                info!(
                    "[randomness] simulated {} fulfilled raffle {} with {}",
                    self.chain, raffle_id, value
                );
                true
            }
            None => false,
        }
    }

    /// Fail the next `n` calls of any kind.
    pub fn fail_next_calls(&self, n: u32) {
        self.state.write().faults.any_calls = n;
    }

    /// Fail the next `n` submissions.
    pub fn fail_next_submissions(&self, n: u32) {
        self.state.write().faults.submissions = n;
    }

    /// Fail the next `n` status queries.
    pub fn fail_next_queries(&self, n: u32) {
        self.state.write().faults.queries = n;
    }

    /// Make every call block until cleared.
    pub fn set_hanging(&self, hang: bool) {
        self.state.write().faults.hang = hang;
    }

    /// Next submission is rejected as already requested.
    pub fn reject_next_as_duplicate(&self) {
        self.state.write().faults.duplicate_next = true;
    }

    /// Set a wallet's fee-token balance in whole tokens.
    pub fn set_balance(&self, wallet: &str, tokens: u64) {
        self.state.write().balances.insert(
            wallet.to_ascii_lowercase(),
            TokenBalance::from_tokens(tokens, DEFAULT_DECIMALS),
        );
    }

    /// Toggle contract reachability.
    pub fn set_contract_reachable(&self, reachable: bool) {
        self.state.write().contract_reachable = reachable;
    }

    /// Toggle the oracle subscription.
    pub fn set_subscription_active(&self, active: bool) {
        self.state.write().subscription_active = active;
    }

    /// Cancel one subscription. Subscription 0 is never active.
    pub fn cancel_subscription(&self, subscription_id: u64) {
        self.state.write().cancelled_subscriptions.insert(subscription_id);
    }

    /// Oracle parameters the contract recorded for a raffle's request.
    pub fn request_params(&self, raffle_id: &RaffleId) -> Option<OracleRequestParams> {
        self.state.read().requests.get(raffle_id).map(|r| r.params.clone())
    }

    /// Successful submissions so far.
    pub fn submission_count(&self) -> usize {
        self.state.read().submissions
    }

    /// Range recorded on chain for a raffle.
    pub fn requested_range(&self, raffle_id: &RaffleId) -> Option<u64> {
        self.state.read().requests.get(raffle_id).map(|r| r.range)
    }

    async fn enter(&self, call: &str) -> Result<(), ChainError> {
        let hang = {
            let mut state = self.state.write();
            if state.faults.any_calls > 0 {
                state.faults.any_calls -= 1;
                return Err(ChainError::Rpc(format!("injected failure in {call}")));
            }
            state.faults.hang
        };
        if hang {
            debug!("[randomness] simulated {} hanging in {}", self.chain, call);
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn make_tx_hash(chain: ChainId, raffle_id: &RaffleId, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain.as_str().as_bytes());
    hasher.update(raffle_id.as_str().as_bytes());
    hasher.update(nonce.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn block_hash(chain: ChainId, height: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"block");
    hasher.update(chain.as_str().as_bytes());
    hasher.update(height.to_be_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[async_trait]
impl ChainAdapter for SimulatedChainAdapter {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn submit_draw(
        &self,
        raffle_id: &RaffleId,
        range: u64,
        options: &DrawOptions,
        oracle: &OracleRequestParams,
    ) -> Result<TxRef, ChainError> {
        self.enter("submit_draw").await?;

        let mut state = self.state.write();
        if state.faults.submissions > 0 {
            state.faults.submissions -= 1;
            return Err(ChainError::Rpc("injected submission failure".into()));
        }
        if let Some(existing) = state.requests.get(raffle_id) {
            if existing.value.is_some() {
                return Err(ChainError::AlreadyFulfilled);
            }
        }
        if state.faults.duplicate_next {
            state.faults.duplicate_next = false;
            let id = state
                .requests
                .get(raffle_id)
                .map(|r| r.oracle_request_id.to_string())
                .unwrap_or_else(|| "unknown".into());
            return Err(ChainError::AlreadyRequested(id));
        }

        state.height += 1;
        let height = state.height;
        let oracle_request_id = state.next_request_id;
        state.next_request_id += 1;
        state.submissions += 1;

        let tx_hash = make_tx_hash(self.chain, raffle_id, oracle_request_id);
        let value = state.scripted.remove(raffle_id);
        state.requests.insert(
            raffle_id.clone(),
            SimRequest {
                oracle_request_id,
                source_chain: options.source_chain,
                range,
                value,
                params: oracle.clone(),
            },
        );
        state.txs.insert(
            tx_hash.clone(),
            TxMetadata {
                tx_hash: tx_hash.clone(),
                block_number: height,
                block_hash: Some(block_hash(self.chain, height)),
                timestamp: DateTime::from_timestamp(GENESIS_TIMESTAMP + height as i64 * BLOCK_TIME_SECS, 0)
                    .unwrap_or_default(),
            },
        );

        debug!(
            "[randomness] simulated {} accepted draw for {} (oracle request {}, block {})",
            self.chain, raffle_id, oracle_request_id, height
        );

        Ok(TxRef {
            chain: self.chain,
            tx_hash,
            oracle_request_id: Some(oracle_request_id.to_string()),
        })
    }

    async fn get_request_status(&self, raffle_id: &RaffleId) -> Result<OracleStatus, ChainError> {
        self.enter("get_request_status").await?;

        let mut state = self.state.write();
        if state.faults.queries > 0 {
            state.faults.queries -= 1;
            return Err(ChainError::Rpc("injected query failure".into()));
        }
        let request = state
            .requests
            .get(raffle_id)
            .ok_or_else(|| ChainError::RequestNotFound(raffle_id.to_string()))?;

        Ok(OracleStatus {
            oracle_request_id: request.oracle_request_id.to_string(),
            fulfilled: request.value.is_some(),
            value: request.value,
            source_chain: request.source_chain,
        })
    }

    async fn get_balance(&self, wallet: &str) -> Result<TokenBalance, ChainError> {
        self.enter("get_balance").await?;
        Ok(self
            .state
            .read()
            .balances
            .get(&wallet.to_ascii_lowercase())
            .copied()
            .unwrap_or(TokenBalance {
                raw: 0,
                decimals: DEFAULT_DECIMALS,
            }))
    }

    async fn get_tx_metadata(&self, tx_hash: &str) -> Result<TxMetadata, ChainError> {
        self.enter("get_tx_metadata").await?;
        self.state
            .read()
            .txs
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::RequestNotFound(tx_hash.to_string()))
    }

    async fn latest_block(&self) -> Result<u64, ChainError> {
        self.enter("latest_block").await?;
        Ok(self.state.read().height)
    }

    async fn contract_reachable(&self) -> Result<bool, ChainError> {
        self.enter("contract_reachable").await?;
        Ok(self.state.read().contract_reachable)
    }

    async fn subscription_active(&self, oracle: &OracleRequestParams) -> Result<bool, ChainError> {
        self.enter("subscription_active").await?;
        let state = self.state.read();
        Ok(state.subscription_active
            && oracle.subscription_id != 0
            && !state.cancelled_subscriptions.contains(&oracle.subscription_id))
    }
}
