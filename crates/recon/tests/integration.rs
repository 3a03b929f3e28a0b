use std::path::PathBuf;

use bankrec_recon::config::MalformedPolicy;
use bankrec_recon::load::load_csv_rows;
use bankrec_recon::{
    run, run_with_cancel, CancelToken, MatchType, RawRow, ReconConfig, ReconError, ReconInput,
    ReconResult, Side,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture_input(config: &ReconConfig) -> ReconInput {
    let dir = fixtures_dir();
    let read = |name: &Option<String>| {
        let path = dir.join(name.as_deref().expect("fixture config names its files"));
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    };
    ReconInput {
        bank: load_csv_rows(Side::Bank, &read(&config.files.bank), &config.columns, b',').unwrap(),
        internal: load_csv_rows(Side::Internal, &read(&config.files.internal), &config.columns, b',')
            .unwrap(),
    }
}

fn fixture_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("january.recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn row(id: Option<&str>, date: &str, value: &str, desc: &str) -> RawRow {
    let mut r = RawRow::new()
        .with("Data", date)
        .with("Valor", value)
        .with("Descricao", desc);
    if let Some(id) = id {
        r = r.with("ID", id);
    }
    r
}

fn config_from(toml: &str) -> ReconConfig {
    ReconConfig::from_toml(toml).unwrap()
}

/// Every normalized row appears exactly once across matched / *_only.
fn assert_partition(result: &ReconResult, bank_rows: usize, internal_rows: usize) {
    let skipped = |side| {
        result
            .summary
            .skipped_rows
            .iter()
            .filter(|s| s.side == side)
            .map(|s| s.source_row_index)
            .collect::<Vec<_>>()
    };

    let mut bank: Vec<usize> = result
        .matched
        .iter()
        .map(|m| m.bank.source_row_index)
        .chain(result.bank_only.iter().map(|t| t.source_row_index))
        .chain(skipped(Side::Bank))
        .collect();
    bank.sort_unstable();
    assert_eq!(bank, (0..bank_rows).collect::<Vec<_>>(), "bank partition");

    let mut internal: Vec<usize> = result
        .matched
        .iter()
        .map(|m| m.internal.source_row_index)
        .chain(result.internal_only.iter().map(|t| t.source_row_index))
        .chain(skipped(Side::Internal))
        .collect();
    internal.sort_unstable();
    assert_eq!(internal, (0..internal_rows).collect::<Vec<_>>(), "internal partition");
}

// -------------------------------------------------------------------------
// Fixture run
// -------------------------------------------------------------------------

#[test]
fn january_statement_reconciles() {
    let config = fixture_config();
    let input = load_fixture_input(&config);
    let result = run(&config, &input).unwrap();

    assert_eq!(result.meta.config_name, "Conta corrente janeiro");
    assert_eq!(result.summary.exact_matches, 2);
    assert_eq!(result.summary.fuzzy_matches, 2);
    assert_eq!(result.summary.bank_only, 2);
    assert_eq!(result.summary.internal_only, 1);
    assert_eq!(result.summary.skipped_internal, 1);
    assert_eq!(result.summary.total_bank, 6);
    assert_eq!(result.summary.total_internal, 5);
    assert!((result.summary.match_rate - 4.0 / 6.0).abs() < 1e-12);

    // Exact matches come first, in identifier order.
    let ids: Vec<_> = result.matched[..2]
        .iter()
        .map(|m| m.bank.external_id.as_deref().unwrap())
        .collect();
    assert_eq!(ids, vec!["TX100", "TX200"]);

    // Fuzzy matches follow, best score first.
    let power = &result.matched[2];
    assert_eq!(power.bank.description, "Conta de Luz");
    assert!(power.score > 0.99);

    let bakery = &result.matched[3];
    assert_eq!(bakery.match_type, MatchType::Fuzzy);
    assert_eq!(bakery.bank.description, "Padaria Pao Quente");
    assert_eq!(bakery.date_offset_days, -1);
    assert!((bakery.score - 0.85).abs() < 1e-9);

    let only: Vec<_> = result.bank_only.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(only, vec!["Assinatura Streaming", "Tarifa Bancaria"]);
    assert_eq!(result.internal_only[0].description, "Supermercado");
    assert_eq!(result.summary.skipped_rows[0].source_row_index, 5);

    assert_partition(&result, 6, 6);
}

#[test]
fn fixture_json_is_byte_identical_across_runs() {
    let config = fixture_config();
    let input = load_fixture_input(&config);

    let mut sequential = config.clone();
    sequential.parallel.enabled = false;

    let a = serde_json::to_string_pretty(&run(&config, &input).unwrap()).unwrap();
    let b = serde_json::to_string_pretty(&run(&config, &input).unwrap()).unwrap();
    let c = serde_json::to_string_pretty(&run(&sequential, &input).unwrap()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

const WITH_ID: &str = r#"
[columns]
id = "ID"
"#;

#[test]
fn exact_identifier_match() {
    let input = ReconInput {
        bank: vec![row(Some("1"), "2024-01-05", "100.00", "Rent")],
        internal: vec![row(Some("1"), "2024-01-05", "100.00", "Monthly Rent")],
    };
    let result = run(&config_from(WITH_ID), &input).unwrap();
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].match_type, MatchType::ExactId);
    assert_eq!(result.matched[0].score, 1.0);
    assert!(result.matched[0].breakdown.is_none());
}

#[test]
fn fuzzy_match_within_one_day() {
    let input = ReconInput {
        bank: vec![row(None, "2024-01-05", "100.00", "Coffee Shop")],
        internal: vec![row(None, "2024-01-06", "100.00", "Coffee Shop Purchase")],
    };
    let result = run(&ReconConfig::default(), &input).unwrap();
    assert_eq!(result.matched.len(), 1);
    let m = &result.matched[0];
    assert_eq!(m.match_type, MatchType::Fuzzy);
    assert!(m.score >= 0.8);
    assert_eq!(m.value_delta, 0);
}

#[test]
fn zero_day_tolerance_leaves_both_unmatched() {
    let config = config_from(
        r#"
[tolerance]
date_days = 0
"#,
    );
    let input = ReconInput {
        bank: vec![row(None, "2024-01-05", "100.00", "Coffee Shop")],
        internal: vec![row(None, "2024-01-06", "100.00", "Coffee Shop Purchase")],
    };
    let result = run(&config, &input).unwrap();
    assert!(result.matched.is_empty());
    assert_eq!(result.bank_only.len(), 1);
    assert_eq!(result.internal_only.len(), 1);
}

#[test]
fn duplicated_identifier_falls_back_to_fuzzy() {
    let input = ReconInput {
        bank: vec![row(Some("A"), "2024-01-05", "50.00", "Transfer")],
        internal: vec![
            row(Some("A"), "2024-01-05", "50.00", "Transfer"),
            row(Some("A"), "2024-03-01", "999.00", "Other"),
        ],
    };
    let result = run(&config_from(WITH_ID), &input).unwrap();
    assert_eq!(result.summary.exact_matches, 0);
    assert_eq!(result.summary.ambiguous_identifiers, vec!["A".to_string()]);
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].match_type, MatchType::Fuzzy);
    assert_eq!(result.matched[0].internal.source_row_index, 0);
    assert_eq!(result.internal_only[0].source_row_index, 1);
}

// -------------------------------------------------------------------------
// Invariants
// -------------------------------------------------------------------------

#[test]
fn identity_pass_takes_precedence() {
    // Bank row 0 is a perfect fuzzy partner for internal row 1, but row 0's
    // id claims internal row 0 first.
    let input = ReconInput {
        bank: vec![row(Some("K"), "2024-01-05", "10.00", "Same text")],
        internal: vec![
            row(Some("K"), "2024-01-09", "10.00", "Unrelated"),
            row(None, "2024-01-05", "10.00", "Same text"),
        ],
    };
    let result = run(&config_from(WITH_ID), &input).unwrap();
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].match_type, MatchType::ExactId);
    assert_eq!(result.matched[0].internal.source_row_index, 0);
    assert_eq!(result.matched[0].date_offset_days, -4);
    assert_eq!(result.internal_only.len(), 1);
}

#[test]
fn no_transaction_is_matched_twice() {
    let bank: Vec<RawRow> = (0..5)
        .map(|_| row(None, "2024-02-01", "20.00", "card purchase"))
        .collect();
    let internal: Vec<RawRow> = (0..3)
        .map(|_| row(None, "2024-02-01", "20.00", "card purchase"))
        .collect();
    let result = run(&ReconConfig::default(), &ReconInput { bank, internal }).unwrap();

    assert_eq!(result.matched.len(), 3);
    // Ties resolve to the lowest source rows on both sides.
    let pairs: Vec<_> = result
        .matched
        .iter()
        .map(|m| (m.bank.source_row_index, m.internal.source_row_index))
        .collect();
    assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2)]);
    assert_partition(&result, 5, 3);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let toml = |threshold: &str| {
        format!(
            r#"
[tolerance]
value = 1.0

[matching]
similarity_threshold = {threshold}

[matching.weights]
date = 0.0
value = 1.0
description = 0.0
"#
        )
    };
    let input = ReconInput {
        bank: vec![row(None, "2024-01-05", "100.00", "a")],
        internal: vec![row(None, "2024-01-05", "100.50", "b")],
    };

    let at = run(&config_from(&toml("0.5")), &input).unwrap();
    assert_eq!(at.matched.len(), 1);
    assert_eq!(at.matched[0].score, 0.5);

    let above = run(&config_from(&toml("0.51")), &input).unwrap();
    assert!(above.matched.is_empty());
}

#[test]
fn empty_inputs_produce_empty_result() {
    let result = run(&ReconConfig::default(), &ReconInput::default()).unwrap();
    assert!(result.matched.is_empty());
    assert_eq!(result.unmatched_count(), 0);
    assert_eq!(result.summary.match_rate, 0.0);
}

// -------------------------------------------------------------------------
// Failure modes
// -------------------------------------------------------------------------

#[test]
fn cancellation_yields_no_partial_result() {
    let cancel = CancelToken::new();
    let observer = cancel.clone();
    cancel.cancel();
    assert!(observer.is_cancelled());

    let config = fixture_config();
    let input = load_fixture_input(&config);
    let err = run_with_cancel(&config, &input, &observer).unwrap_err();
    assert_eq!(err, ReconError::Cancelled);
}

#[test]
fn invalid_config_is_rejected() {
    let err = ReconConfig::from_toml("[tolerance]\ndate_days = -1\n").unwrap_err();
    assert!(matches!(err, ReconError::InvalidConfiguration(_)));

    let err = ReconConfig::from_toml("[matching]\nsimilarity_threshold = 1.5\n").unwrap_err();
    assert!(matches!(err, ReconError::InvalidConfiguration(_)));

    let err = ReconConfig::from_toml("[matching]\nthreshold = 0.5\n").unwrap_err();
    assert!(matches!(err, ReconError::ConfigParse(_)));
}

#[test]
fn abort_policy_fails_on_first_malformed_row() {
    let mut config = fixture_config();
    config.on_malformed = MalformedPolicy::Abort;
    let input = load_fixture_input(&config);
    let err = run(&config, &input).unwrap_err();
    assert_eq!(
        err,
        ReconError::MalformedRecord {
            side: Side::Internal,
            row: 5,
            field: "date".into(),
            value: "bad-date".into(),
        }
    );
}

#[test]
fn missing_column_is_reported() {
    let config = fixture_config();
    let err = load_csv_rows(Side::Bank, "Data,Valor\n2024-01-05,1\n", &config.columns, b',')
        .unwrap_err();
    assert_eq!(err.to_string(), "bank input: missing column 'Descricao'");
}

#[test]
fn short_rows_are_skipped_or_kept() {
    let config = ReconConfig::default();
    let bank_csv = "Data,Valor,Descricao\n2024-01-05,10,Padaria\n2024-01-06,20\n2024-01-07\n";
    let internal_csv = "Data,Valor,Descricao\n2024-01-05,10,Padaria\n";
    let input = ReconInput {
        bank: load_csv_rows(Side::Bank, bank_csv, &config.columns, b',').unwrap(),
        internal: load_csv_rows(Side::Internal, internal_csv, &config.columns, b',').unwrap(),
    };

    let result = run(&config, &input).unwrap();
    assert_eq!(result.summary.matched, 1);
    assert_eq!(result.bank_only.len(), 1);
    assert_eq!(result.bank_only[0].source_row_index, 1);
    assert_eq!(result.bank_only[0].description, "");
    assert_eq!(result.summary.skipped_bank, 1);
    assert_eq!(result.summary.skipped_rows[0].source_row_index, 2);
    assert_eq!(result.summary.skipped_rows[0].reason, "missing value");
    assert_partition(&result, 3, 1);
}
