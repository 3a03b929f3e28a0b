use crate::model::{MatchType, MatchedPair, ReconSummary, Side, SkippedRow, Transaction};

/// Compute summary statistics from a finished partition.
///
/// Side totals are derived from the partition itself (matched + only), so
/// they count normalized transactions; skipped rows are reported apart.
pub fn compute_summary(
    matched: &[MatchedPair],
    bank_only: &[Transaction],
    internal_only: &[Transaction],
    ambiguous_identifiers: Vec<String>,
    skipped_rows: Vec<SkippedRow>,
) -> ReconSummary {
    let exact_matches = matched
        .iter()
        .filter(|m| m.match_type == MatchType::ExactId)
        .count();
    let fuzzy_matches = matched.len() - exact_matches;

    let total_bank = matched.len() + bank_only.len();
    let total_internal = matched.len() + internal_only.len();
    let denom = total_bank.max(total_internal).max(1);

    let skipped_bank = skipped_rows.iter().filter(|s| s.side == Side::Bank).count();
    let skipped_internal = skipped_rows.len() - skipped_bank;

    ReconSummary {
        total_bank,
        total_internal,
        matched: matched.len(),
        exact_matches,
        fuzzy_matches,
        bank_only: bank_only.len(),
        internal_only: internal_only.len(),
        skipped_bank,
        skipped_internal,
        match_rate: matched.len() as f64 / denom as f64,
        ambiguous_identifiers,
        skipped_rows,
    }
}
