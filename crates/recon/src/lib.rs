//! `bankrec-recon`: two-phase bank statement reconciliation engine.
//!
//! Pure engine crate: receives column-mapped rows (or already normalized
//! transactions), pairs bank records with internal records, and returns the
//! partition plus a summary. No CLI or file IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod identity;
pub mod load;
pub mod model;
pub mod normalize;
pub mod score;
pub mod summary;

pub use config::ReconConfig;
pub use engine::{reconcile, reconcile_with, run, run_with_cancel, CancelToken};
pub use fuzzy::{FuzzyMatcher, GreedyMatcher};
pub use error::ReconError;
pub use model::{MatchType, MatchedPair, RawRow, ReconInput, ReconResult, Side, Transaction};
