//! # Lifecycle Properties
//!
//! Invariants that must hold for every raffle regardless of path.

#[cfg(test)]
mod tests {
    use crate::harness::{genesis, Harness};
    use chrono::Duration;
    use rand::Rng;
    use raffle_randomness::algorithms::is_failsafe_provenance;
    use raffle_randomness::{
        AlertKind, ChainId, DrawOptions, DrawPath, FailsafeRandomnessProvider, HistoryQuery,
        RaffleRecordRepository, RandomnessApi, RandomnessError, RequestStatus,
    };

    #[test]
    fn failsafe_draw_always_in_range() {
        let provider = FailsafeRandomnessProvider::new();
        let mut rng = rand::thread_rng();
        for range in (1..=20).chain((0..200).map(|_| rng.gen_range(1..=u64::MAX / 2))) {
            let draw = provider.draw_uniform(range, genesis()).unwrap();
            assert!((1..=range).contains(&draw.value), "range {range} drew {}", draw.value);
            assert!(is_failsafe_provenance(&draw.provenance));
        }
    }

    #[test]
    fn failsafe_draw_rejects_zero_range() {
        let err = FailsafeRandomnessProvider::new()
            .draw_uniform(0, genesis())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn failsafe_records_never_carry_a_transaction_hash() {
        let h = Harness::new();

        // Oracle path.
        let oracle = h.in_flight("oracle", ChainId::Polygon, 9).await;
        h.polygon.fulfill(&oracle, 9);
        h.coordinator.check_fulfillment(&oracle).await.unwrap();

        // Forced by admin.
        let forced = h.in_flight("forced", ChainId::Ethereum, 9).await;
        h.coordinator.force_failsafe(&forced, "admin").await.unwrap();

        // Submission failure.
        let failed = h.register("failed", ChainId::Base).await;
        h.base.fail_next_submissions(1);
        h.coordinator
            .start_draw(&failed, 9, DrawOptions::on_chain(ChainId::Base))
            .await
            .unwrap();

        // Stale.
        let stale = h.in_flight("stale", ChainId::Polygon, 9).await;
        h.clock.advance(Duration::minutes(11));
        h.monitor.poll_once().await.unwrap();
        assert!(h.record(&stale).await.failsafe_used);

        let page = h
            .coordinator
            .repository()
            .list(&HistoryQuery {
                page_size: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        for record in page.items {
            assert!(record.is_resolved(), "{} not resolved", record.raffle_id);
            let value = record.winning_number.unwrap();
            assert!((1..=9).contains(&value));
            if record.failsafe_used {
                assert!(record.transaction_hash.is_none(), "{}", record.raffle_id);
                assert!(is_failsafe_provenance(record.request_id.as_deref().unwrap()));
            } else {
                assert!(record.transaction_hash.is_some());
            }
        }
    }

    #[tokio::test]
    async fn second_request_creates_no_second_transaction() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 10).await;
        let first = h.record(&id).await;

        let err = h
            .coordinator
            .request_draw(&id, 10, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap_err();
        assert!(matches!(err, RandomnessError::AlreadyRequested { .. }));

        let outcome = h
            .coordinator
            .start_draw(&id, 10, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap();
        assert_eq!(outcome.path, DrawPath::Existing);

        assert_eq!(h.polygon.submission_count(), 1);
        let after = h.record(&id).await;
        assert_eq!(after.request_id, first.request_id);
        assert_eq!(after.transaction_hash, first.transaction_hash);
    }

    #[tokio::test]
    async fn stale_request_resolves_without_operator_action() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 4).await;

        h.clock.advance(Duration::minutes(9));
        assert_eq!(h.monitor.poll_once().await.unwrap().waiting, 1);
        assert_eq!(h.record(&id).await.status, RequestStatus::InProgress);

        h.clock.advance(Duration::minutes(2));
        assert_eq!(h.monitor.poll_once().await.unwrap().failsafe, 1);

        let record = h.record(&id).await;
        assert_eq!(record.status, RequestStatus::Fulfilled);
        assert!(record.failsafe_used);
        assert!((1..=4).contains(&record.winning_number.unwrap()));
        assert_eq!(record.failure_reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn late_oracle_value_does_not_override_failsafe() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 4).await;
        h.clock.advance(Duration::minutes(11));
        h.monitor.poll_once().await.unwrap();
        let resolved = h.record(&id).await.winning_number;

        h.polygon.fulfill(&id, 4);
        h.monitor.poll_once().await.unwrap();
        h.coordinator.check_fulfillment(&id).await.unwrap();

        let record = h.record(&id).await;
        assert!(record.failsafe_used);
        assert_eq!(record.winning_number, resolved);
    }

    #[tokio::test]
    async fn force_failsafe_on_resolved_is_noop() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 6).await;
        h.polygon.fulfill(&id, 5);
        h.coordinator.check_fulfillment(&id).await.unwrap();

        let outcome = h.coordinator.force_failsafe(&id, "admin").await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.winning_number(), Some(5));

        h.coordinator.mark_completed(&id).await.unwrap();
        let outcome = h.coordinator.force_failsafe(&id, "admin").await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.record.status, RequestStatus::Completed);
        assert_eq!(outcome.winning_number(), Some(5));
        assert!(h.alerts.of_kind(AlertKind::FailsafeTriggered).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_oracle_value_is_stored_and_alerted() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 5).await;
        h.polygon.fulfill(&id, 6);
        h.coordinator.check_fulfillment(&id).await.unwrap();

        let record = h.record(&id).await;
        assert_eq!(record.winning_number, Some(6));
        assert_eq!(h.alerts.of_kind(AlertKind::OracleValueOutOfRange).len(), 1);

        let result = h.verifier.verify(&id).await.unwrap();
        assert!(result.verified);
        assert!(!result.in_range);
    }

    #[tokio::test]
    async fn validation_errors_surface_without_state_change() {
        let h = Harness::new();
        let id = h.register("raffle-1", ChainId::Polygon).await;

        let err = h
            .coordinator
            .start_draw(&id, 0, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.record(&id).await.status, RequestStatus::Pending);
        assert_eq!(h.polygon.submission_count(), 0);
    }

    #[tokio::test]
    async fn manual_request_resubmits_stuck_draw() {
        let h = Harness::new();
        let id = h.in_flight("raffle-1", ChainId::Polygon, 8).await;
        let first = h.record(&id).await;

        let record = h.coordinator.manual_request(&id, ChainId::Polygon).await.unwrap();
        assert_eq!(record.status, RequestStatus::InProgress);
        assert_eq!(record.range, Some(8));
        assert_ne!(record.request_id, first.request_id);
        assert_eq!(h.polygon.submission_count(), 2);
    }
}
