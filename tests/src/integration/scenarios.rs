//! # Lifecycle Scenarios
//!
//! End-to-end flows through coordinator, monitor and verifier:
//!
//! | Scenario | Flow |
//! |----------|------|
//! | A | oracle keeps failing → retry budget exhausted → failsafe |
//! | B | oracle fulfills → stored → verified |
//! | C | Solana raffle settled on the settlement chain → verified there |
//! | D | oracle value seeds a multi-round expansion → rounds verifiable |

#[cfg(test)]
mod tests {
    use crate::harness::{Harness, SETTLEMENT};
    use raffle_randomness::algorithms::seed_from_random_value;
    use raffle_randomness::{
        expand_seed, verify_expansion, AlertKind, ChainId, DrawOptions, DrawPath,
        FulfillmentCheck, RandomnessApi, RequestStatus, Verdict,
    };

    // =========================================================================
    // SCENARIO A: ORACLE FAILURES → FAILSAFE
    // =========================================================================

    #[tokio::test]
    async fn scenario_a_repeated_oracle_failures_resolve_by_failsafe() {
        let h = Harness::new();
        let id = h.in_flight("raffle-a", ChainId::Polygon, 7).await;
        h.polygon.fail_next_queries(3);

        for attempt in 1..=2 {
            let check = h.coordinator.check_fulfillment(&id).await.unwrap();
            assert!(
                matches!(check, FulfillmentCheck::Waiting { last_error: Some(_), .. }),
                "attempt {attempt}: {check:?}"
            );
        }
        let check = h.coordinator.check_fulfillment(&id).await.unwrap();
        assert!(matches!(check, FulfillmentCheck::FailsafeResolved(_)));

        let record = h.record(&id).await;
        assert_eq!(record.status, RequestStatus::Fulfilled);
        assert!(record.failsafe_used);
        assert!((1..=7).contains(&record.winning_number.unwrap()));
        assert!(record.transaction_hash.is_none());
        assert_eq!(record.failure_reason.as_deref(), Some("query_failed"));
        assert_eq!(h.alerts.of_kind(AlertKind::FailsafeTriggered).len(), 1);
    }

    #[tokio::test]
    async fn scenario_a_via_monitor_polls() {
        let h = Harness::new();
        let id = h.in_flight("raffle-a", ChainId::Polygon, 7).await;
        h.polygon.fail_next_queries(3);

        let mut failsafe = 0;
        for _ in 0..3 {
            failsafe += h.monitor.poll_once().await.unwrap().failsafe;
        }
        assert_eq!(failsafe, 1);
        assert!(h.record(&id).await.failsafe_used);
    }

    #[tokio::test]
    async fn scenario_a_submission_failure_falls_back_immediately() {
        let h = Harness::new();
        let id = h.register("raffle-a", ChainId::Polygon).await;
        h.polygon.fail_next_submissions(1);

        let outcome = h
            .coordinator
            .start_draw(&id, 7, DrawOptions::on_chain(ChainId::Polygon))
            .await
            .unwrap();
        assert_eq!(outcome.path, DrawPath::Failsafe);
        assert!(outcome.record.failsafe_used);
        assert!(outcome.record.transaction_hash.is_none());
        assert!((1..=7).contains(&outcome.record.winning_number.unwrap()));
    }

    // =========================================================================
    // SCENARIO B: ORACLE FULFILLS → VERIFIED
    // =========================================================================

    #[tokio::test]
    async fn scenario_b_oracle_fulfillment_is_verified() {
        let h = Harness::new();
        let id = h.in_flight("raffle-b", ChainId::Polygon, 5).await;
        assert!(h.polygon.fulfill(&id, 3));

        let summary = h.monitor.poll_once().await.unwrap();
        assert_eq!(summary.fulfilled, 1);

        let record = h.record(&id).await;
        assert_eq!(record.status, RequestStatus::Fulfilled);
        assert!(!record.failsafe_used);
        assert_eq!(record.winning_number, Some(3));
        assert!(record.transaction_hash.is_some());

        let result = h.verifier.verify(&id).await.unwrap();
        assert_eq!(result.verdict, Verdict::Verified);
        assert!(result.verified);
        assert_eq!(result.on_chain_value, Some(3));
        assert!(result.block_number.is_some());
        assert!(result.verification_url.is_some());
    }

    #[tokio::test]
    async fn scenario_b_completes_after_winner_recorded() {
        let h = Harness::new();
        let id = h.in_flight("raffle-b", ChainId::Base, 5).await;
        h.base.fulfill(&id, 2);
        h.coordinator.check_fulfillment(&id).await.unwrap();

        let record = h.coordinator.mark_completed(&id).await.unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        assert_eq!(record.winning_number, Some(2));
        assert_eq!(h.verifier.verify(&id).await.unwrap().verdict, Verdict::Verified);
    }

    // =========================================================================
    // SCENARIO C: CROSS-CHAIN SETTLEMENT
    // =========================================================================

    #[tokio::test]
    async fn scenario_c_cross_chain_draw_from_solana() {
        let h = Harness::new();
        let id = h.register("raffle-c", ChainId::Solana).await;

        let record = h
            .coordinator
            .request_draw(&id, 10, DrawOptions::cross_chain(ChainId::Solana))
            .await
            .unwrap();
        assert_eq!(record.status, RequestStatus::InProgress);
        assert_eq!(record.source_chain, ChainId::Solana);
        assert_eq!(record.settlement_chain, Some(SETTLEMENT));
        assert!(record.settlement_tx_hash.is_some());
        assert_eq!(h.polygon.requested_range(&id), Some(10));

        h.polygon.fulfill(&id, 8);
        let check = h.coordinator.check_fulfillment(&id).await.unwrap();
        assert!(matches!(check, FulfillmentCheck::Fulfilled(_)));

        let record = h.record(&id).await;
        assert_eq!(record.winning_number, Some(8));
        assert_eq!(record.source_chain, ChainId::Solana);
        assert!(record.settlement_tx_hash.is_some());

        let result = h.verifier.verify(&id).await.unwrap();
        assert_eq!(result.verdict, Verdict::Verified);
        assert_eq!(result.chain, SETTLEMENT);
        assert_eq!(result.source_chain, ChainId::Solana);
        assert_eq!(result.transaction_hash, record.settlement_tx_hash);
    }

    #[tokio::test]
    async fn scenario_c_same_chain_draw_on_unsupported_chain_falls_back() {
        let h = Harness::new();
        let id = h.register("raffle-c", ChainId::Solana).await;

        let outcome = h
            .coordinator
            .start_draw(&id, 10, DrawOptions::on_chain(ChainId::Solana))
            .await
            .unwrap();
        assert_eq!(outcome.path, DrawPath::Failsafe);
        assert_eq!(outcome.record.failure_reason.as_deref(), Some("unsupported_chain"));
    }

    // =========================================================================
    // SCENARIO D: SEED EXPANSION
    // =========================================================================

    #[tokio::test]
    async fn scenario_d_oracle_value_seeds_verifiable_rounds() {
        let h = Harness::new();
        let id = h.in_flight("raffle-d", ChainId::Ethereum, 1_000).await;
        h.ethereum.fulfill(&id, 777);
        h.coordinator.check_fulfillment(&id).await.unwrap();

        let seed = seed_from_random_value(h.record(&id).await.winning_number.unwrap());
        let rounds = expand_seed(&seed, 10).unwrap();
        assert_eq!(rounds.len(), 10);
        assert!(rounds.iter().all(|v| (0.0..1.0).contains(v)));

        let check = verify_expansion(&seed, 10, 4, rounds[4]);
        assert!(check.valid);
        assert_eq!(check.expected, Some(rounds[4]));

        let tampered = verify_expansion(&seed, 10, 4, rounds[4] + 0.01);
        assert!(!tampered.valid);

        let out_of_bounds = verify_expansion(&seed, 10, 10, rounds[4]);
        assert!(!out_of_bounds.valid);
    }
}
