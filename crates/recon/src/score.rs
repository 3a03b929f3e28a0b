//! Similarity scorer.
//!
//! A pair is a candidate only when its date and value both fall within
//! tolerance; [`score_pair`] returns `None` otherwise. Within tolerance the
//! composite score is the weighted average of three terms in `[0, 1]`.

use std::collections::BTreeSet;

use crate::config::ScoreWeights;
use crate::model::{ScoreBreakdown, Transaction};

/// Smallest value tolerance used as a divisor: one micro-unit.
const VALUE_EPSILON_MICROS: i64 = 1;

/// Scoring parameters resolved from a validated config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    pub date_tolerance_days: u32,
    pub value_tolerance_micros: i64,
    pub weights: ScoreWeights,
}

impl ScoreParams {
    pub fn from_config(config: &crate::config::ReconConfig) -> Self {
        Self {
            date_tolerance_days: config.tolerance.date_days_u32(),
            value_tolerance_micros: config.tolerance.value_micros(),
            weights: config.matching.weights,
        }
    }
}

/// Score a bank/internal pair. `None` when date or value is out of tolerance.
pub fn score_pair(
    bank: &Transaction,
    internal: &Transaction,
    params: &ScoreParams,
) -> Option<(f64, ScoreBreakdown)> {
    let days = (bank.date - internal.date).num_days().unsigned_abs();
    if days > params.date_tolerance_days as u64 {
        return None;
    }

    let value_diff = bank.value_micros.abs_diff(internal.value_micros);
    if value_diff > params.value_tolerance_micros.max(0) as u64 {
        return None;
    }

    let breakdown = ScoreBreakdown {
        date_score: date_score(days, params.date_tolerance_days),
        value_score: value_score(value_diff, params.value_tolerance_micros),
        description_score: text_similarity(&bank.match_text, &internal.match_text),
    };
    Some((composite(&breakdown, &params.weights), breakdown))
}

/// `max(0, 1 - days / (tolerance + 1))`
pub fn date_score(days: u64, tolerance_days: u32) -> f64 {
    let score = 1.0 - days as f64 / (tolerance_days as f64 + 1.0);
    score.max(0.0)
}

/// `max(0, 1 - diff / max(tolerance, epsilon))`
pub fn value_score(diff_micros: u64, tolerance_micros: i64) -> f64 {
    let denom = tolerance_micros.max(VALUE_EPSILON_MICROS) as f64;
    let score = 1.0 - diff_micros as f64 / denom;
    score.max(0.0)
}

/// Weighted average of the three terms, normalized by the weight sum.
pub fn composite(b: &ScoreBreakdown, w: &ScoreWeights) -> f64 {
    let total = w.total();
    if total <= 0.0 {
        return 0.0;
    }
    let sum = w.date * b.date_score + w.value * b.value_score + w.description * b.description_score;
    (sum / total).clamp(0.0, 1.0)
}

/// Token-set similarity of two already folded descriptions, in `[0, 1]`.
///
/// Tokens shared by both sides form a common core; the score is the best
/// normalized Levenshtein similarity among `core` vs `core + rest_a`,
/// `core` vs `core + rest_b`, and `core + rest_a` vs `core + rest_b`.
/// Symmetric; 1.0 when one token set contains the other. Empty text on
/// either side scores 0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let core = common.join(" ");
    let combined_a = join_tokens(&core, &only_a);
    let combined_b = join_tokens(&core, &only_b);

    let mut best = strsim::normalized_levenshtein(&combined_a, &combined_b);
    if !core.is_empty() {
        best = best
            .max(strsim::normalized_levenshtein(&core, &combined_a))
            .max(strsim::normalized_levenshtein(&core, &combined_b));
    }
    best.clamp(0.0, 1.0)
}

fn join_tokens(core: &str, rest: &[&str]) -> String {
    if rest.is_empty() {
        return core.to_string();
    }
    let rest = rest.join(" ");
    if core.is_empty() {
        rest
    } else {
        format!("{core} {rest}")
    }
}
