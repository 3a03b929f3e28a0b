//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 60-69   | recon            | Reconciliation engine codes              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant command

use bankrec_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// Runtime failure: unreadable input, missing column, malformed row under
/// `on_malformed = "abort"`, or output write error.
pub const EXIT_RECON_RUNTIME: u8 = 61;

/// Run completed but unmatched rows remain (only with `--fail-on-unmatched`).
pub const EXIT_RECON_UNMATCHED: u8 = 62;

/// Run was cancelled (`--timeout` elapsed) before producing a result.
pub const EXIT_RECON_CANCELLED: u8 = 63;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::InvalidConfiguration(_) => {
            EXIT_RECON_INVALID_CONFIG
        }
        ReconError::Cancelled => EXIT_RECON_CANCELLED,
        ReconError::MissingColumn { .. }
        | ReconError::MalformedRecord { .. }
        | ReconError::MatcherContract(_)
        | ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}
