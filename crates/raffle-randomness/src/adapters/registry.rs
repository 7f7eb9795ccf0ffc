//! Chain adapter registry keyed by chain identifier.

use crate::domain::{ChainId, RandomnessError, RandomnessResult};
use crate::ports::outbound::ChainAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Adapters by chain, plus the settlement chain used for cross-chain draws.
#[derive(Clone)]
pub struct ChainAdapterRegistry {
    adapters: BTreeMap<ChainId, Arc<dyn ChainAdapter>>,
    settlement: ChainId,
}

impl ChainAdapterRegistry {
    /// Empty registry settling cross-chain draws on `settlement`.
    pub fn new(settlement: ChainId) -> Self {
        Self {
            adapters: BTreeMap::new(),
            settlement,
        }
    }

    /// Register an adapter under the chain it reports. Replaces any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) -> &mut Self {
        self.adapters.insert(adapter.chain(), adapter);
        self
    }

    /// Builder form of [`ChainAdapterRegistry::register`].
    pub fn with(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adapter for `chain`.
    pub fn get(&self, chain: ChainId) -> RandomnessResult<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or(RandomnessError::UnsupportedChain(chain))
    }

    /// Whether an adapter serves `chain`.
    pub fn contains(&self, chain: ChainId) -> bool {
        self.adapters.contains_key(&chain)
    }

    /// Settlement chain id.
    pub fn settlement_chain(&self) -> ChainId {
        self.settlement
    }

    /// Adapter for the settlement chain.
    pub fn settlement(&self) -> RandomnessResult<Arc<dyn ChainAdapter>> {
        self.get(self.settlement)
    }

    /// Registered chains.
    pub fn chains(&self) -> Vec<ChainId> {
        self.adapters.keys().copied().collect()
    }
}
