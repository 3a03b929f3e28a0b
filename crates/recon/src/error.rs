use std::fmt;

use crate::model::Side;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Tolerance, threshold, weight or batch settings out of range.
    InvalidConfiguration(String),
    /// Mapped column not present in the input header.
    MissingColumn { side: Side, column: String },
    /// Row whose date or value cannot be parsed.
    MalformedRecord {
        side: Side,
        row: usize,
        field: String,
        value: String,
    },
    /// A fuzzy matcher returned a pair that reuses a transaction or points
    /// outside the residual sets.
    MatcherContract(String),
    /// Caller requested abort; no partial result exists.
    Cancelled,
    /// IO error (CSV read, etc.).
    Io(String),
}

impl ReconError {
    /// Short reason text for a malformed row, as recorded in the summary.
    pub fn row_reason(&self) -> String {
        match self {
            Self::MalformedRecord { field, value, .. } if value.is_empty() => {
                format!("missing {field}")
            }
            Self::MalformedRecord { field, value, .. } => {
                format!("cannot parse {field} '{value}'")
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::MissingColumn { side, column } => {
                write!(f, "{side} input: missing column '{column}'")
            }
            Self::MalformedRecord { side, row, field, value } => {
                write!(f, "{side} row {row}: cannot parse {field} '{value}'")
            }
            Self::MatcherContract(msg) => write!(f, "fuzzy matcher returned an invalid pair: {msg}"),
            Self::Cancelled => write!(f, "reconciliation cancelled"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
