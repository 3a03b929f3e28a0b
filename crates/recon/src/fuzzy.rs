//! Fuzzy matching over the residual sets left by the identity pass.
//!
//! [`GreedyMatcher`] is a greedy approximation of maximum-weight bipartite
//! matching: candidates are ranked once and accepted best-first without
//! backtracking. It can settle for fewer or lower-scoring pairs than an
//! optimal assignment (a bank row taking its best partner may strand another
//! bank row whose only partner that was). That trade-off is accepted for
//! near-linear behaviour on real statement volumes. An optimal solver can be
//! dropped in behind [`FuzzyMatcher`] without touching the orchestrator.

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use rayon::prelude::*;

use crate::config::ReconConfig;
use crate::engine::CancelToken;
use crate::error::ReconError;
use crate::model::{MatchCandidate, MatchType, Transaction};
use crate::score::{score_pair, ScoreParams};

/// Pairs residual bank and internal transactions.
pub trait FuzzyMatcher {
    /// Strategy name, reported in the result metadata.
    fn name(&self) -> &'static str;

    /// Returns accepted, non-conflicting pairs in acceptance order.
    /// Candidate positions index `bank` and `internal`, both of which are in
    /// source-row order.
    fn match_residuals(
        &self,
        bank: &[&Transaction],
        internal: &[&Transaction],
        cancel: &CancelToken,
    ) -> Result<Vec<MatchCandidate>, ReconError>;
}

#[derive(Debug, Clone)]
pub struct GreedyMatcher {
    pub params: ScoreParams,
    pub threshold: f64,
    pub parallel: bool,
    pub batch_size: usize,
}

impl GreedyMatcher {
    pub fn from_config(config: &ReconConfig) -> Self {
        Self {
            params: ScoreParams::from_config(config),
            threshold: config.matching.similarity_threshold,
            parallel: config.parallel.enabled,
            batch_size: config.parallel.batch_size.max(1),
        }
    }

    /// Score every in-tolerance pair at or above the threshold.
    ///
    /// Internal transactions are indexed by date so each bank transaction
    /// only visits its `±date_tolerance_days` window. Bank transactions are
    /// scored in batches; `cancel` is checked before each batch.
    pub fn candidates(
        &self,
        bank: &[&Transaction],
        internal: &[&Transaction],
        cancel: &CancelToken,
    ) -> Result<Vec<MatchCandidate>, ReconError> {
        self.scored_batches(bank, internal, cancel, |batch, scored| {
            log::trace!("batch {batch}: {scored} candidates");
        })
    }

    /// Batch loop behind [`candidates`](Self::candidates). `after_batch` runs
    /// with the batch number and its candidate count once each batch is scored.
    fn scored_batches(
        &self,
        bank: &[&Transaction],
        internal: &[&Transaction],
        cancel: &CancelToken,
        mut after_batch: impl FnMut(usize, usize),
    ) -> Result<Vec<MatchCandidate>, ReconError> {
        let mut by_date: Vec<usize> = (0..internal.len()).collect();
        by_date.sort_by_key(|&i| (internal[i].date, i));

        let window = Days::new(self.params.date_tolerance_days as u64);
        let score_one = |b: usize| -> Vec<MatchCandidate> {
            let tx = bank[b];
            let lo = tx.date.checked_sub_days(window).unwrap_or(NaiveDate::MIN);
            let hi = tx.date.checked_add_days(window).unwrap_or(NaiveDate::MAX);
            let start = by_date.partition_point(|&i| internal[i].date < lo);

            by_date[start..]
                .iter()
                .take_while(|&&i| internal[i].date <= hi)
                .filter_map(|&i| {
                    let (score, breakdown) = score_pair(tx, internal[i], &self.params)?;
                    (score >= self.threshold).then_some(MatchCandidate {
                        bank: b,
                        internal: i,
                        score,
                        match_type: MatchType::Fuzzy,
                        breakdown: Some(breakdown),
                    })
                })
                .collect()
        };

        let positions: Vec<usize> = (0..bank.len()).collect();
        let mut out = Vec::new();
        for (n, batch) in positions.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(ReconError::Cancelled);
            }
            let mut scored: Vec<MatchCandidate> = if self.parallel {
                batch.par_iter().flat_map_iter(|&b| score_one(b)).collect()
            } else {
                batch.iter().flat_map(|&b| score_one(b)).collect()
            };
            after_batch(n, scored.len());
            out.append(&mut scored);
        }
        Ok(out)
    }
}

impl FuzzyMatcher for GreedyMatcher {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn match_residuals(
        &self,
        bank: &[&Transaction],
        internal: &[&Transaction],
        cancel: &CancelToken,
    ) -> Result<Vec<MatchCandidate>, ReconError> {
        let mut candidates = self.candidates(bank, internal, cancel)?;
        let candidate_count = candidates.len();

        candidates.sort_by(|a, b| rank(a, b, bank, internal));

        let mut bank_claimed = vec![false; bank.len()];
        let mut internal_claimed = vec![false; internal.len()];
        let mut accepted = Vec::new();

        for c in candidates {
            if bank_claimed[c.bank] || internal_claimed[c.internal] {
                continue;
            }
            bank_claimed[c.bank] = true;
            internal_claimed[c.internal] = true;
            accepted.push(c);
        }

        log::debug!(
            "fuzzy pass: {} x {} residuals, {candidate_count} candidates, {} accepted",
            bank.len(),
            internal.len(),
            accepted.len(),
        );

        Ok(accepted)
    }
}

/// Score descending, then bank source row, then internal source row.
fn rank(
    a: &MatchCandidate,
    b: &MatchCandidate,
    bank: &[&Transaction],
    internal: &[&Transaction],
) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| bank[a.bank].source_row_index.cmp(&bank[b.bank].source_row_index))
        .then_with(|| a.bank.cmp(&b.bank))
        .then_with(|| {
            internal[a.internal]
                .source_row_index
                .cmp(&internal[b.internal].source_row_index)
        })
        .then_with(|| a.internal.cmp(&b.internal))
}
