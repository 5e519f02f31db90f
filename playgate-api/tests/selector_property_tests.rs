//! Property-Based Tests for Node Selection
//!
//! For any set of candidate prefixes:
//! - a single successful best-node probe always wins, qualified with its
//!   own prefix;
//! - with no success and no named node, the result is unroutable and
//!   carries an error;
//! - every prefix is probed exactly twice before the selector answers.

use playgate_api::NodeSelector;
use playgate_core::{ProbeError, SelectionResult};
use playgate_test_utils::generators::{arb_prefix, arb_stream_id};
use playgate_test_utils::{not_found, transport, MockProber};
use proptest::collection::hash_set;
use proptest::prelude::*;

fn runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

fn select(
    prober: MockProber,
    prefixes: &[String],
    stream_id: &str,
) -> Result<(SelectionResult, usize), TestCaseError> {
    let selector = NodeSelector::new(prober);
    let result = runtime()?.block_on(selector.get_best_node(prefixes, stream_id, None, None));
    Ok((result, selector.prober().probe_count()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_winner_wins(
        prefixes in hash_set(arb_prefix(), 1..6),
        stream_id in arb_stream_id(),
        pick in any::<prop::sample::Index>(),
    ) {
        let prefixes: Vec<String> = prefixes.into_iter().collect();
        let winner = pick.get(&prefixes).clone();

        let mut prober = MockProber::new();
        for prefix in &prefixes {
            let outcome = if *prefix == winner {
                Ok("edge".to_string())
            } else {
                Err(not_found(format!("{}+{}", prefix, stream_id)))
            };
            prober = prober.on_best(prefix, outcome);
        }

        let (result, probes) = select(prober, &prefixes, &stream_id)?;
        prop_assert_eq!(result.node_address, "edge");
        prop_assert_eq!(result.stream_id, format!("{}+{}", winner, stream_id));
        prop_assert_eq!(result.error, None);
        prop_assert_eq!(probes, prefixes.len() * 2);
    }

    #[test]
    fn prop_no_node_is_unroutable(
        prefixes in hash_set(arb_prefix(), 1..6),
        stream_id in arb_stream_id(),
    ) {
        let prefixes: Vec<String> = prefixes.into_iter().collect();

        let mut prober = MockProber::new();
        for (i, prefix) in prefixes.iter().enumerate() {
            let failure = if i % 2 == 0 {
                transport("down")
            } else {
                not_found(format!("{}+{}", prefix, stream_id))
            };
            prober = prober.on_best(prefix, Err(failure));
        }

        let (result, probes) = select(prober, &prefixes, &stream_id)?;
        prop_assert!(!result.is_routable());
        prop_assert!(result.stream_id.is_empty());
        prop_assert!(result.error.is_some());
        prop_assert_ne!(result.error, Some(ProbeError::NoCandidates));
        prop_assert_eq!(probes, prefixes.len() * 2);
    }
}
