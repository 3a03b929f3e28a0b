use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::normalize::fold_description;

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Which of the two sources a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Bank,
    Internal,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bank => write!(f, "bank"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One input row: column name -> raw cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for assembling rows by hand.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(|s| s.as_str())
    }
}

/// Rows for both sides, in source order.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub bank: Vec<RawRow>,
    pub internal: Vec<RawRow>,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A normalized record. `value_micros` is 1e-6 of the currency unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub side: Side,
    pub source_row_index: usize,
    pub date: NaiveDate,
    #[serde(rename = "value", serialize_with = "serialize_micros")]
    pub value_micros: i64,
    pub description: String,
    /// Case-folded, whitespace-collapsed description. Comparison only.
    #[serde(skip)]
    pub match_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl Transaction {
    pub fn new(
        side: Side,
        source_row_index: usize,
        date: NaiveDate,
        value_micros: i64,
        description: &str,
        external_id: Option<&str>,
    ) -> Self {
        let description = description.trim().to_string();
        let match_text = fold_description(&description);
        let external_id = external_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Self {
            side,
            source_row_index,
            date,
            value_micros,
            description,
            match_text,
            external_id,
        }
    }
}

/// Format micro-units as a decimal string with at least two fraction digits.
///
/// Example: 100_000_000 -> "100.00", 1_234_500 -> "1.2345", -500_000 -> "-0.50"
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let whole = abs / 1_000_000;
    let frac = format!("{:06}", abs % 1_000_000);
    let trimmed = frac.trim_end_matches('0');
    let frac = if trimmed.len() < 2 { &frac[..2] } else { trimmed };
    format!("{sign}{whole}.{frac}")
}

fn serialize_micros<S: Serializer>(micros: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_micros(*micros))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactId,
    Fuzzy,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactId => write!(f, "exact_id"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// Per-term scores behind a fuzzy composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub date_score: f64,
    pub value_score: f64,
    pub description_score: f64,
}

/// A proposed pairing. `bank` / `internal` are positions in the residual
/// transaction slices handed to the matcher, not source row indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub bank: usize,
    pub internal: usize,
    pub score: f64,
    pub match_type: MatchType,
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub bank: Transaction,
    pub internal: Transaction,
    pub score: f64,
    pub match_type: MatchType,
    /// bank date minus internal date.
    pub date_offset_days: i64,
    /// bank value minus internal value.
    #[serde(serialize_with = "serialize_micros")]
    pub value_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl MatchedPair {
    pub fn new(
        bank: Transaction,
        internal: Transaction,
        score: f64,
        match_type: MatchType,
        breakdown: Option<ScoreBreakdown>,
    ) -> Self {
        let date_offset_days = (bank.date - internal.date).num_days();
        let value_delta = bank.value_micros - internal.value_micros;
        Self {
            bank,
            internal,
            score,
            match_type,
            date_offset_days,
            value_delta,
            breakdown,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// A row dropped by the normalizer under the `skip` policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub side: Side,
    pub source_row_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total_bank: usize,
    pub total_internal: usize,
    pub matched: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub bank_only: usize,
    pub internal_only: usize,
    pub skipped_bank: usize,
    pub skipped_internal: usize,
    pub match_rate: f64,
    pub ambiguous_identifiers: Vec<String>,
    pub skipped_rows: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub matched: Vec<MatchedPair>,
    pub bank_only: Vec<Transaction>,
    pub internal_only: Vec<Transaction>,
}

impl ReconResult {
    /// Rows left without a counterpart on either side.
    pub fn unmatched_count(&self) -> usize {
        self.bank_only.len() + self.internal_only.len()
    }
}
