use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub parallel: ParallelConfig,
    /// Input file locations. Only read by the CLI; the engine ignores it.
    #[serde(default)]
    pub files: FilesConfig,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            columns: ColumnMapping::default(),
            tolerance: ToleranceConfig::default(),
            matching: MatchingConfig::default(),
            on_malformed: MalformedPolicy::default(),
            date_formats: default_date_formats(),
            parallel: ParallelConfig::default(),
            files: FilesConfig::default(),
        }
    }
}

fn default_date_formats() -> Vec<String> {
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Which input columns hold date, value, description and (optionally) id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    #[serde(default = "default_date_col")]
    pub date: String,
    #[serde(default = "default_value_col")]
    pub value: String,
    #[serde(default = "default_desc_col")]
    pub description: String,
    #[serde(default)]
    pub id: Option<String>,
}

fn default_date_col() -> String {
    "Data".into()
}

fn default_value_col() -> String {
    "Valor".into()
}

fn default_desc_col() -> String {
    "Descricao".into()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: default_date_col(),
            value: default_value_col(),
            description: default_desc_col(),
            id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance + matching
// ---------------------------------------------------------------------------

/// Signed on purpose: negative values must reach `validate` to be rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceConfig {
    #[serde(default = "default_date_days")]
    pub date_days: i64,
    /// Maximum absolute value difference, in currency units.
    #[serde(default = "default_value_tolerance")]
    pub value: f64,
}

fn default_date_days() -> i64 {
    1
}

fn default_value_tolerance() -> f64 {
    0.01
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            date_days: default_date_days(),
            value: default_value_tolerance(),
        }
    }
}

impl ToleranceConfig {
    /// Value tolerance in micro-units. Call after `validate`.
    pub fn value_micros(&self) -> i64 {
        (self.value * 1_000_000.0).round() as i64
    }

    /// Date tolerance in days. Call after `validate`.
    pub fn date_days_u32(&self) -> u32 {
        self.date_days.clamp(0, u32::MAX as i64) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub weights: ScoreWeights,
}

fn default_threshold() -> f64 {
    0.8
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Relative weights of the composite score terms.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    #[serde(default = "default_date_weight")]
    pub date: f64,
    #[serde(default = "default_value_weight")]
    pub value: f64,
    #[serde(default = "default_desc_weight")]
    pub description: f64,
}

fn default_date_weight() -> f64 {
    0.3
}

fn default_value_weight() -> f64 {
    0.4
}

fn default_desc_weight() -> f64 {
    0.3
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            date: default_date_weight(),
            value: default_value_weight(),
            description: default_desc_weight(),
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.date + self.value + self.description
    }
}

// ---------------------------------------------------------------------------
// Malformed rows, parallelism, files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Drop the row and record it in the summary.
    #[default]
    Skip,
    /// Fail the whole run on the first malformed row.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bank transactions scored per batch; cancellation is checked between batches.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    512
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub internal: Option<String>,
    /// Field delimiter; sniffed from the file when absent.
    #[serde(default)]
    pub delimiter: Option<char>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::InvalidConfiguration(msg));

        if self.tolerance.date_days < 0 {
            return invalid(format!(
                "tolerance.date_days must be >= 0, got {}",
                self.tolerance.date_days
            ));
        }
        if self.tolerance.date_days > u32::MAX as i64 {
            return invalid(format!(
                "tolerance.date_days too large: {}",
                self.tolerance.date_days
            ));
        }

        let value_tol = self.tolerance.value;
        if !value_tol.is_finite() || value_tol < 0.0 {
            return invalid(format!("tolerance.value must be >= 0, got {value_tol}"));
        }
        // i64 micro-units top out around 9.2e12 currency units.
        if value_tol > 1e12 {
            return invalid(format!("tolerance.value too large: {value_tol}"));
        }

        let threshold = self.matching.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return invalid(format!(
                "matching.similarity_threshold must be within [0, 1], got {threshold}"
            ));
        }

        let w = &self.matching.weights;
        for (name, weight) in [("date", w.date), ("value", w.value), ("description", w.description)] {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(format!("matching.weights.{name} must be >= 0, got {weight}"));
            }
        }
        if w.total() <= 0.0 {
            return invalid("matching.weights must not all be zero".into());
        }

        if self.parallel.batch_size == 0 {
            return invalid("parallel.batch_size must be at least 1".into());
        }

        if self.date_formats.is_empty() {
            return invalid("date_formats must list at least one format".into());
        }

        let cols = &self.columns;
        for (name, col) in [
            ("date", &cols.date),
            ("value", &cols.value),
            ("description", &cols.description),
        ] {
            if col.trim().is_empty() {
                return invalid(format!("columns.{name} must not be empty"));
            }
        }
        if cols.id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return invalid("columns.id must not be empty when present".into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
