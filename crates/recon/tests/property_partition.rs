// Property-based tests for the reconciliation partition.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use bankrec_recon::config::ScoreWeights;
use bankrec_recon::{reconcile, CancelToken, MatchType, ReconConfig, Side, Transaction};

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const WORDS: &[&str] = &["pix", "ted", "rent", "coffee", "shop", "salary", "fee", "card"];

/// (day offset, cents, description words, id)
type TxShape = (u64, i64, Vec<usize>, Option<u8>);

/// Small domains so collisions (same value, same day, same id) are common.
fn arb_tx_shape() -> impl Strategy<Value = TxShape> {
    (
        0u64..10,
        prop_oneof![3 => 0i64..20, 1 => -50_000i64..50_000],
        prop::collection::vec(0..WORDS.len(), 0..3),
        prop_oneof![3 => Just(None), 1 => (0u8..4).prop_map(Some)],
    )
}

fn arb_config() -> impl Strategy<Value = ReconConfig> {
    (0i64..3, 0u32..3, 0.0..=1.0f64, 0.0..2.0f64, 0.0..2.0f64, 0.1..2.0f64, 1usize..8).prop_map(
        |(days, cents, threshold, wd, wv, wt, batch)| {
            let mut config = ReconConfig::default();
            config.tolerance.date_days = days;
            config.tolerance.value = cents as f64 / 100.0;
            config.matching.similarity_threshold = threshold;
            config.matching.weights = ScoreWeights {
                date: wd,
                value: wv,
                description: wt,
            };
            config.parallel.batch_size = batch;
            config
        },
    )
}

fn build(side: Side, shapes: &[TxShape]) -> Vec<Transaction> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    shapes
        .iter()
        .enumerate()
        .map(|(idx, (day, cents, words, id))| {
            let desc: Vec<&str> = words.iter().map(|&w| WORDS[w]).collect();
            let id = id.map(|n| format!("ID{n}"));
            Transaction::new(
                side,
                idx,
                base + Days::new(*day),
                cents * 10_000,
                &desc.join(" "),
                id.as_deref(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn partition_is_complete_and_disjoint(
        bank in prop::collection::vec(arb_tx_shape(), 0..25),
        internal in prop::collection::vec(arb_tx_shape(), 0..25),
        config in arb_config(),
    ) {
        let bank = build(Side::Bank, &bank);
        let internal = build(Side::Internal, &internal);
        let (n_bank, n_internal) = (bank.len(), internal.len());

        let result = reconcile(&config, bank, internal, &CancelToken::new()).unwrap();

        let mut seen_bank = HashSet::new();
        let mut seen_internal = HashSet::new();
        for m in &result.matched {
            prop_assert!(seen_bank.insert(m.bank.source_row_index), "bank reused");
            prop_assert!(seen_internal.insert(m.internal.source_row_index), "internal reused");
        }
        for t in &result.bank_only {
            prop_assert!(seen_bank.insert(t.source_row_index));
        }
        for t in &result.internal_only {
            prop_assert!(seen_internal.insert(t.source_row_index));
        }
        prop_assert_eq!(seen_bank.len(), n_bank);
        prop_assert_eq!(seen_internal.len(), n_internal);

        prop_assert_eq!(result.summary.matched, result.matched.len());
        prop_assert_eq!(result.summary.total_bank, n_bank);
        prop_assert_eq!(result.summary.total_internal, n_internal);
    }

    #[test]
    fn fuzzy_matches_respect_tolerance_and_threshold(
        bank in prop::collection::vec(arb_tx_shape(), 0..25),
        internal in prop::collection::vec(arb_tx_shape(), 0..25),
        config in arb_config(),
    ) {
        let bank = build(Side::Bank, &bank);
        let internal = build(Side::Internal, &internal);
        let result = reconcile(&config, bank, internal, &CancelToken::new()).unwrap();

        let value_tol = config.tolerance.value_micros();
        for m in result.matched.iter().filter(|m| m.match_type == MatchType::Fuzzy) {
            prop_assert!(m.score >= config.matching.similarity_threshold);
            prop_assert!(m.date_offset_days.abs() <= config.tolerance.date_days);
            prop_assert!(m.value_delta.abs() <= value_tol);
        }
        for m in result.matched.iter().filter(|m| m.match_type == MatchType::ExactId) {
            prop_assert_eq!(m.score, 1.0);
            prop_assert_eq!(&m.bank.external_id, &m.internal.external_id);
        }
    }

    #[test]
    fn result_is_deterministic(
        bank in prop::collection::vec(arb_tx_shape(), 0..25),
        internal in prop::collection::vec(arb_tx_shape(), 0..25),
        config in arb_config(),
    ) {
        let bank = build(Side::Bank, &bank);
        let internal = build(Side::Internal, &internal);

        let mut sequential = config.clone();
        sequential.parallel.enabled = false;

        let cancel = CancelToken::new();
        let a = reconcile(&config, bank.clone(), internal.clone(), &cancel).unwrap();
        let b = reconcile(&sequential, bank.clone(), internal.clone(), &cancel).unwrap();

        // Input order must not matter either: the engine orders by source row.
        let mut bank_rev = bank;
        bank_rev.reverse();
        let c = reconcile(&config, bank_rev, internal, &cancel).unwrap();

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
    }
}
