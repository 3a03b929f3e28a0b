use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{MalformedPolicy, ReconConfig};
use crate::error::ReconError;
use crate::fuzzy::{FuzzyMatcher, GreedyMatcher};
use crate::identity::match_by_identifier;
use crate::model::{
    MatchCandidate, MatchedPair, RawRow, ReconInput, ReconMeta, ReconResult, Side, SkippedRow,
    Transaction,
};
use crate::normalize::normalize_row;
use crate::summary::compute_summary;

/// Cooperative cancellation flag, checked between phases and scoring batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ReconError> {
        if self.is_cancelled() {
            Err(ReconError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run reconciliation per config over raw rows. Never cancelled.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    run_with_cancel(config, input, &CancelToken::new())
}

/// Run reconciliation per config over raw rows.
///
/// Malformed rows are skipped and listed in the summary, or abort the run,
/// depending on `config.on_malformed`.
pub fn run_with_cancel(
    config: &ReconConfig,
    input: &ReconInput,
    cancel: &CancelToken,
) -> Result<ReconResult, ReconError> {
    config.validate()?;

    let mut skipped = Vec::new();
    cancel.check()?;
    let bank = normalize_side(Side::Bank, &input.bank, config, &mut skipped)?;
    cancel.check()?;
    let internal = normalize_side(Side::Internal, &input.internal, config, &mut skipped)?;

    log::debug!(
        "normalized {} bank / {} internal rows ({} skipped)",
        bank.len(),
        internal.len(),
        skipped.len(),
    );

    let matcher = GreedyMatcher::from_config(config);
    execute(config, &matcher, bank, internal, skipped, cancel)
}

/// Reconcile already-normalized transactions with the default greedy matcher.
pub fn reconcile(
    config: &ReconConfig,
    bank: Vec<Transaction>,
    internal: Vec<Transaction>,
    cancel: &CancelToken,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    let matcher = GreedyMatcher::from_config(config);
    execute(config, &matcher, bank, internal, Vec::new(), cancel)
}

/// Reconcile already-normalized transactions with a caller-supplied matcher.
pub fn reconcile_with(
    config: &ReconConfig,
    matcher: &dyn FuzzyMatcher,
    bank: Vec<Transaction>,
    internal: Vec<Transaction>,
    cancel: &CancelToken,
) -> Result<ReconResult, ReconError> {
    config.validate()?;
    execute(config, matcher, bank, internal, Vec::new(), cancel)
}

fn normalize_side(
    side: Side,
    rows: &[RawRow],
    config: &ReconConfig,
    skipped: &mut Vec<SkippedRow>,
) -> Result<Vec<Transaction>, ReconError> {
    let mut out = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        match normalize_row(side, idx, row, &config.columns, &config.date_formats) {
            Ok(tx) => out.push(tx),
            Err(e) => match config.on_malformed {
                MalformedPolicy::Abort => return Err(e),
                MalformedPolicy::Skip => {
                    log::warn!("skipping {e}");
                    skipped.push(SkippedRow {
                        side,
                        source_row_index: idx,
                        reason: e.row_reason(),
                    });
                }
            },
        }
    }
    Ok(out)
}

/// Identity pass, fuzzy pass over the residuals, then assembly.
fn execute(
    config: &ReconConfig,
    matcher: &dyn FuzzyMatcher,
    mut bank: Vec<Transaction>,
    mut internal: Vec<Transaction>,
    skipped: Vec<SkippedRow>,
    cancel: &CancelToken,
) -> Result<ReconResult, ReconError> {
    cancel.check()?;

    // Source-row order makes positions a valid tie-break and keeps the
    // *_only lists in source order.
    bank.sort_by_key(|t| t.source_row_index);
    internal.sort_by_key(|t| t.source_row_index);

    let identity = match_by_identifier(&bank, &internal);
    cancel.check()?;

    let mut bank_used = vec![false; bank.len()];
    let mut internal_used = vec![false; internal.len()];
    for m in &identity.matched {
        bank_used[m.bank] = true;
        internal_used[m.internal] = true;
    }

    let bank_residual: Vec<usize> = unused_positions(&bank_used);
    let internal_residual: Vec<usize> = unused_positions(&internal_used);

    let fuzzy: Vec<MatchCandidate> = {
        let bank_refs: Vec<&Transaction> = bank_residual.iter().map(|&p| &bank[p]).collect();
        let internal_refs: Vec<&Transaction> =
            internal_residual.iter().map(|&p| &internal[p]).collect();
        matcher.match_residuals(&bank_refs, &internal_refs, cancel)?
    };
    cancel.check()?;

    // Claim every fuzzy pair before building any output, so a matcher that
    // breaks its contract leaves no partial result.
    let mut fuzzy_positions = Vec::with_capacity(fuzzy.len());
    for c in &fuzzy {
        let (b, i) = match (bank_residual.get(c.bank), internal_residual.get(c.internal)) {
            (Some(&b), Some(&i)) => (b, i),
            _ => {
                return Err(ReconError::MatcherContract(format!(
                    "position ({}, {}) outside {} x {} residuals",
                    c.bank,
                    c.internal,
                    bank_residual.len(),
                    internal_residual.len(),
                )))
            }
        };
        if bank_used[b] || internal_used[i] {
            return Err(ReconError::MatcherContract(format!(
                "bank row {} / internal row {} already matched",
                bank[b].source_row_index, internal[i].source_row_index,
            )));
        }
        bank_used[b] = true;
        internal_used[i] = true;
        fuzzy_positions.push((b, i));
    }

    let mut matched = Vec::with_capacity(identity.matched.len() + fuzzy.len());
    for m in &identity.matched {
        matched.push(commit(&bank, &internal, m, m.bank, m.internal));
    }
    for (c, &(b, i)) in fuzzy.iter().zip(&fuzzy_positions) {
        matched.push(commit(&bank, &internal, c, b, i));
    }

    let bank_only = leftovers(&bank, &bank_used);
    let internal_only = leftovers(&internal, &internal_used);

    let summary = compute_summary(&matched, &bank_only, &internal_only, identity.ambiguous, skipped);

    log::debug!(
        "reconciled: {} exact, {} fuzzy, {} bank-only, {} internal-only",
        summary.exact_matches,
        summary.fuzzy_matches,
        summary.bank_only,
        summary.internal_only,
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            strategy: matcher.name().to_string(),
        },
        summary,
        matched,
        bank_only,
        internal_only,
    })
}

fn commit(
    bank: &[Transaction],
    internal: &[Transaction],
    c: &MatchCandidate,
    bank_pos: usize,
    internal_pos: usize,
) -> MatchedPair {
    MatchedPair::new(
        bank[bank_pos].clone(),
        internal[internal_pos].clone(),
        c.score,
        c.match_type,
        c.breakdown,
    )
}

fn unused_positions(used: &[bool]) -> Vec<usize> {
    used.iter()
        .enumerate()
        .filter(|(_, &u)| !u)
        .map(|(i, _)| i)
        .collect()
}

fn leftovers(txs: &[Transaction], used: &[bool]) -> Vec<Transaction> {
    txs.iter()
        .zip(used)
        .filter(|(_, &u)| !u)
        .map(|(t, _)| t.clone())
        .collect()
}
