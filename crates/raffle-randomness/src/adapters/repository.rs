//! In-memory raffle record repository.
//!
//! Compare-and-set by version under a single write lock.

use crate::domain::{RaffleId, RandomnessRequestRecord, RepositoryError, RequestStatus};
use crate::ports::outbound::{HistoryQuery, Page, RaffleRecordRepository, StatusCounts};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Records held in process memory.
#[derive(Default)]
pub struct InMemoryRaffleRepository {
    records: RwLock<HashMap<RaffleId, RandomnessRequestRecord>>,
}

impl InMemoryRaffleRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// No records stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Overwrite a record regardless of version. Test seeding only.
    pub fn insert_unchecked(&self, record: RandomnessRequestRecord) {
        self.records.write().insert(record.raffle_id.clone(), record);
    }
}

#[async_trait]
impl RaffleRecordRepository for InMemoryRaffleRepository {
    async fn create(&self, record: RandomnessRequestRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write();
        if records.contains_key(&record.raffle_id) {
            return Err(RepositoryError::AlreadyExists(record.raffle_id));
        }
        records.insert(record.raffle_id.clone(), record);
        Ok(())
    }

    async fn get(
        &self,
        raffle_id: &RaffleId,
    ) -> Result<Option<RandomnessRequestRecord>, RepositoryError> {
        Ok(self.records.read().get(raffle_id).cloned())
    }

    async fn save_if_unchanged(
        &self,
        expected_version: u64,
        record: &RandomnessRequestRecord,
    ) -> Result<bool, RepositoryError> {
        let mut records = self.records.write();
        match records.get_mut(&record.raffle_id) {
            Some(stored) if stored.version == expected_version => {
                *stored = record.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::Backend(format!(
                "no record for raffle {}",
                record.raffle_id
            ))),
        }
    }

    async fn find_in_progress(
        &self,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        let mut found: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.status == RequestStatus::InProgress && r.transaction_hash.is_some())
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.requested_at, r.raffle_id.clone()));
        found.truncate(limit);
        Ok(found)
    }

    async fn find_by_status(
        &self,
        status: RequestStatus,
        limit: usize,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        let mut found: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.created_at, r.raffle_id.clone()));
        found.truncate(limit);
        Ok(found)
    }

    async fn list(
        &self,
        query: &HistoryQuery,
    ) -> Result<Page<RandomnessRequestRecord>, RepositoryError> {
        let mut matching: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.raffle_id.cmp(&b.raffle_id))
        });

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.page.saturating_mul(query.page_size))
            .take(query.page_size)
            .collect();

        Ok(Page {
            items,
            page: query.page,
            page_size: query.page_size,
            total,
        })
    }

    async fn find_resolved_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RandomnessRequestRecord>, RepositoryError> {
        let mut found: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.is_resolved())
            .filter(|r| r.fulfilled_at.is_some_and(|at| at >= from && at < to))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.fulfilled_at, r.raffle_id.clone()));
        Ok(found)
    }

    async fn purge_failure_metadata(&self, before: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut purged = 0;
        for record in self.records.write().values_mut() {
            if record.status == RequestStatus::Failed {
                continue;
            }
            if record.failed_at.is_some_and(|at| at < before) {
                record.failure_reason = None;
                record.failed_at = None;
                record.version += 1;
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        let mut counts: StatusCounts = RequestStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for record in self.records.read().values() {
            *counts.entry(record.status).or_default() += 1;
        }
        Ok(counts)
    }

    async fn failsafe_count(&self) -> Result<usize, RepositoryError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.is_resolved() && r.failsafe_used)
            .count())
    }
}
