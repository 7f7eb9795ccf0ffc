//! # Concurrency
//!
//! The record is the serialization point: concurrent admin and monitor
//! writers race on compare-and-set and exactly one resolution wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use raffle_randomness::ports::StatusCounts;
use raffle_randomness::{
    HistoryQuery, InMemoryRaffleRepository, Page, RaffleId, RaffleRecordRepository,
    RandomnessRequestRecord, RepositoryError, RequestStatus,
};

/// Repository that reports a lost race for the next `n` writes.
#[derive(Default)]
pub struct ContendedRepository {
    inner: InMemoryRaffleRepository,
    lose_next: Mutex<u32>,
}

impl ContendedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lose the next `n` compare-and-set writes.
    pub fn lose_next_writes(&self, n: u32) {
        *self.lose_next.lock() = n;
    }
}

#[async_trait]
impl RaffleRecordRepository for ContendedRepository {
    async fn create(&self, record: RandomnessRequestRecord) -> Result<(), RepositoryError> {
        self.inner.create(record).await
    }

    async fn get(
        &self,
        raffle_id: &RaffleId,
    ) -> Result<Option<RandomnessRequestRecord>, RepositoryError> {
        self.inner.get(raffle_id).await
    }

    async fn save_if_unchanged(
        &self,
        expected_version: u64,
        record: &RandomnessRequestRecord,
    ) -> Result<bool, RepositoryError> {
        {
            let mut lose = self.lose_next.lock();
            if *lose > 0 {
                *lose -= 1;
                return Ok(false);
            }
        }
        self.inner.save_if_unchanged(expected_version, record).await
    }

    async fn find_in_progress(
        &self,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        self.inner.find_in_progress(limit).await
    }

    async fn find_by_status(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        self.inner.find_by_status(status, limit).await
    }

    async fn list(
        &self,
        query: &HistoryQuery,
    ) -> Result<Page<RandomnessRequestRecord>, RepositoryError> {
        self.inner.list(query).await
    }

    async fn find_resolved_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        self.inner.find_resolved_between(from, to).await
    }

    async fn purge_failure_metadata(&self, before: DateTime<Utc>) -> Result<usize, RepositoryError> {
        self.inner.purge_failure_metadata(before).await
    }

    async fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        self.inner.status_counts().await
    }

    async fn failsafe_count(&self) -> Result<usize, RepositoryError> {
        self.inner.failsafe_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{genesis, Harness};
    use raffle_randomness::{
        ChainAdapterRegistry, ChainId, CoordinatorConfig, DrawOptions, FulfillmentCheck,
        ManualClock, RandomnessApi, RandomnessCoordinator, RandomnessError, RecordingAlertSink,
        SimulatedChainAdapter,
    };
    use std::sync::Arc;

    fn contended() -> (
        RandomnessCoordinator<ContendedRepository>,
        Arc<ContendedRepository>,
        Arc<SimulatedChainAdapter>,
    ) {
        let repository = Arc::new(ContendedRepository::new());
        let polygon = Arc::new(SimulatedChainAdapter::new(ChainId::Polygon));
        let coordinator = RandomnessCoordinator::new(
            CoordinatorConfig::default(),
            repository.clone(),
            Arc::new(ChainAdapterRegistry::new(ChainId::Polygon).with(polygon.clone())),
            Arc::new(RecordingAlertSink::new()),
            Arc::new(ManualClock::new(genesis())),
        );
        (coordinator, repository, polygon)
    }

    #[tokio::test]
    async fn lost_races_are_retried() {
        let (coordinator, repository, _) = contended();
        let id = RaffleId::new("raffle-1");
        coordinator.register_raffle(&id, ChainId::Polygon).await.unwrap();

        repository.lose_next_writes(3);
        let record = coordinator
            .request_draw(&id, 5, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap();
        assert_eq!(record.status, RequestStatus::InProgress);
    }

    #[tokio::test]
    async fn persistent_contention_is_reported() {
        let (coordinator, repository, polygon) = contended();
        let id = RaffleId::new("raffle-1");
        coordinator.register_raffle(&id, ChainId::Polygon).await.unwrap();
        coordinator
            .request_draw(&id, 5, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap();
        polygon.fulfill(&id, 2);

        repository.lose_next_writes(u32::MAX);
        let err = coordinator.check_fulfillment(&id).await.unwrap_err();
        assert!(matches!(
            err,
            RandomnessError::ConcurrentModification { attempts: 5, .. }
        ));

        repository.lose_next_writes(0);
        let check = coordinator.check_fulfillment(&id).await.unwrap();
        assert!(matches!(check, FulfillmentCheck::Fulfilled(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_submit_once() {
        let h = Arc::new(Harness::new());
        let id = h.register("raffle-1", ChainId::Polygon).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                let id = id.clone();
                tokio::spawn(async move {
                    h.coordinator
                        .request_draw(&id, 10, DrawOptions::on_chain(ChainId::Polygon))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(RandomnessError::AlreadyRequested { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 1);
        // Losers are turned away before reaching the chain.
        assert_eq!(h.polygon.submission_count(), 1);

        let record = h.record(&id).await;
        assert_eq!(record.status, RequestStatus::InProgress);
        assert!(record.request_id.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admin_and_monitor_race_resolves_once() {
        let h = Arc::new(Harness::new());
        let mut ids = Vec::new();
        for i in 0..20 {
            let id = h.in_flight(&format!("raffle-{i}"), ChainId::Polygon, 50).await;
            h.polygon.fulfill(&id, 25);
            ids.push(id);
        }

        let admin = {
            let h = Arc::clone(&h);
            let ids = ids.clone();
            tokio::spawn(async move {
                let mut applied = 0;
                for id in &ids {
                    if h.coordinator.force_failsafe(id, "admin").await.unwrap().applied {
                        applied += 1;
                    }
                }
                applied
            })
        };
        let monitor = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.monitor.poll_once().await.unwrap().fulfilled })
        };

        let applied = admin.await.unwrap();
        let fulfilled = monitor.await.unwrap();
        assert_eq!(applied + fulfilled, ids.len());

        for id in &ids {
            let record = h.record(id).await;
            assert_eq!(record.status, RequestStatus::Fulfilled);
            if record.failsafe_used {
                assert!(record.transaction_hash.is_none());
            } else {
                assert_eq!(record.winning_number, Some(25));
            }
        }
    }
}
