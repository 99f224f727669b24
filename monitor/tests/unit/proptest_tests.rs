//! Property Tests: ヘルス状態の導出

use std::time::Duration;

use endpoint_monitor::history::HistoryRing;
use endpoint_monitor::registry::EndpointRegistry;
use endpoint_monitor::types::{EndpointSpec, ProbeErrorKind, ProbeResult};
use proptest::prelude::*;

/// 応答ありならステータス、なしなら失敗種別
fn outcome() -> impl Strategy<Value = Option<u16>> {
    prop_oneof![
        1 => Just(None::<u16>),
        3 => (100u16..=599).prop_map(Some),
    ]
}

proptest! {
    #[test]
    fn is_healthy_matches_last_status(
        expected in 100u16..=599,
        outcomes in prop::collection::vec(outcome(), 1..20),
    ) {
        let registry = EndpointRegistry::new();
        let history = HistoryRing::new(10);
        let endpoint = registry
            .register_with(
                EndpointSpec::new("Property endpoint", "http://localhost")
                    .with_expected_status(expected as i32),
                |endpoint| history.track(endpoint.id),
            )
            .unwrap();

        for observed in outcomes {
            let result = match observed {
                Some(status) => {
                    ProbeResult::response(endpoint.id, status, expected, Duration::from_millis(1))
                }
                None => ProbeResult::failure(endpoint.id, ProbeErrorKind::Timeout, Duration::ZERO),
            };
            let updated = registry.record_result(endpoint.id, &result).unwrap();

            prop_assert_eq!(updated.last_status, observed);
            prop_assert_eq!(updated.last_check, Some(result.timestamp));
            prop_assert_eq!(updated.is_healthy, observed == Some(expected));
            prop_assert_eq!(updated.is_healthy, result.success);
        }
    }

    #[test]
    fn history_keeps_most_recent_in_order(
        capacity in 1usize..16,
        appended in 0usize..40,
    ) {
        let history = HistoryRing::new(capacity);
        let id = uuid::Uuid::new_v4();
        history.track(id);

        for i in 0..appended {
            let result = ProbeResult::response(id, 200, 200, Duration::from_millis(i as u64));
            prop_assert!(history.append(id, result).unwrap());
        }

        let kept = history.recent(id, capacity);
        prop_assert_eq!(kept.len(), appended.min(capacity));
        let latencies: Vec<u64> = kept.iter().map(|r| r.latency_ms).collect();
        let first = appended.saturating_sub(capacity) as u64;
        let expected: Vec<u64> = (first..appended as u64).collect();
        prop_assert_eq!(latencies, expected);
    }
}
