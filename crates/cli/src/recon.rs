//! `bankrec run` / `bankrec validate` / `bankrec inspect`: config-driven
//! statement reconciliation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;

use bankrec_recon::load::load_csv_rows;
use bankrec_recon::{run_with_cancel, CancelToken, RawRow, ReconConfig, ReconInput, ReconResult, Side};

use crate::exit_codes::{
    recon_exit_code, EXIT_ERROR, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME, EXIT_RECON_UNMATCHED,
    EXIT_USAGE,
};
use crate::export::write_csv_dir;
use crate::inspect::cmd_inspect;
use crate::input::{read_file_as_utf8, sniff_delimiter};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile a bank statement against the internal ledger
    #[command(after_help = "\
Examples:
  bankrec run january.recon.toml
  bankrec run january.recon.toml --json
  bankrec run january.recon.toml --bank extrato.csv --internal razao.csv
  bankrec run january.recon.toml --output result.json --csv-dir out/
  bankrec run january.recon.toml --fail-on-unmatched --quiet")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Bank statement CSV (overrides [files].bank)
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Internal ledger CSV (overrides [files].internal)
        #[arg(long)]
        internal: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write matched.csv, bank_only.csv and internal_only.csv into DIR
        #[arg(long, value_name = "DIR")]
        csv_dir: Option<PathBuf>,

        /// Exit 62 when any row is left unmatched
        #[arg(long)]
        fail_on_unmatched: bool,

        /// Cancel the run after SECS seconds (exit 63)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Suppress the human summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  bankrec validate january.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Show a statement file's columns, row count and first rows
    #[command(after_help = "\
Examples:
  bankrec inspect extrato.csv
  bankrec inspect extrato.csv --rows 10
  bankrec inspect razao.csv --delimiter ';' --json")]
    Inspect {
        /// CSV file to inspect
        file: PathBuf,

        /// Number of rows to preview
        #[arg(long, default_value_t = 5)]
        rows: usize,

        /// Field delimiter (sniffed when omitted)
        #[arg(long)]
        delimiter: Option<char>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            bank,
            internal,
            json,
            output,
            csv_dir,
            fail_on_unmatched,
            timeout,
            quiet,
        } => cmd_run(RunOptions {
            config_path: config,
            bank,
            internal,
            json,
            output,
            csv_dir,
            fail_on_unmatched,
            timeout,
            quiet,
        }),
        ReconCommands::Validate { config } => cmd_validate(config),
        ReconCommands::Inspect { file, rows, delimiter, json } => {
            cmd_inspect(file, rows, delimiter, json)
        }
    }
}

struct RunOptions {
    config_path: PathBuf,
    bank: Option<PathBuf>,
    internal: Option<PathBuf>,
    json: bool,
    output: Option<PathBuf>,
    csv_dir: Option<PathBuf>,
    fail_on_unmatched: bool,
    timeout: Option<u64>,
    quiet: bool,
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn engine_err(err: bankrec_recon::ReconError) -> CliError {
    recon_err(recon_exit_code(&err), err.to_string())
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        recon_err(EXIT_USAGE, format!("cannot read config {}: {e}", path.display()))
    })?;
    let config = ReconConfig::from_toml(&config_str).map_err(engine_err)?;
    configured_delimiter(&config)?;
    Ok(config)
}

/// `[files].delimiter` as a byte. Must be a single ASCII character.
fn configured_delimiter(config: &ReconConfig) -> Result<Option<u8>, CliError> {
    config
        .files
        .delimiter
        .map(|c| {
            u8::try_from(c).ok().filter(u8::is_ascii).ok_or_else(|| {
                recon_err(
                    EXIT_RECON_INVALID_CONFIG,
                    format!("files.delimiter must be an ASCII character, got {c:?}"),
                )
            })
        })
        .transpose()
}

/// CLI flag wins (relative to the working directory); otherwise the config
/// entry, relative to the config file's directory.
fn resolve_input(
    flag: Option<PathBuf>,
    configured: Option<&str>,
    base_dir: &Path,
    side: Side,
) -> Result<PathBuf, CliError> {
    if let Some(path) = flag {
        return Ok(path);
    }
    match configured {
        Some(file) => Ok(base_dir.join(file)),
        None => Err(recon_err(EXIT_USAGE, format!("no {side} input file"))
            .with_hint(format!("set [files].{side} in the config or pass --{side}"))),
    }
}

fn load_side(side: Side, path: &Path, config: &ReconConfig) -> Result<Vec<RawRow>, CliError> {
    let text = read_file_as_utf8(path).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display()))
    })?;
    let delimiter = match configured_delimiter(config)? {
        Some(d) => d,
        None => sniff_delimiter(&text),
    };
    log::debug!("{side}: {} (delimiter {:?})", path.display(), delimiter as char);
    load_csv_rows(side, &text, &config.columns, delimiter).map_err(engine_err)
}

fn cmd_run(opts: RunOptions) -> Result<(), CliError> {
    let config = load_config(&opts.config_path)?;
    let base_dir = opts
        .config_path
        .parent()
        .unwrap_or_else(|| Path::new("."));

    let bank_path = resolve_input(opts.bank, config.files.bank.as_deref(), base_dir, Side::Bank)?;
    let internal_path = resolve_input(
        opts.internal,
        config.files.internal.as_deref(),
        base_dir,
        Side::Internal,
    )?;

    let input = ReconInput {
        bank: load_side(Side::Bank, &bank_path, &config)?,
        internal: load_side(Side::Internal, &internal_path, &config)?,
    };

    let cancel = CancelToken::new();
    if let Some(secs) = opts.timeout {
        let watchdog = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            watchdog.cancel();
        });
    }

    let result = run_with_cancel(&config, &input, &cancel).map_err(engine_err)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = opts.output {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        if !opts.quiet {
            eprintln!("wrote {}", path.display());
        }
    }

    if let Some(ref dir) = opts.csv_dir {
        let written = write_csv_dir(&result, dir).map_err(|e| recon_err(EXIT_RECON_RUNTIME, e))?;
        if !opts.quiet {
            for path in written {
                eprintln!("wrote {}", path.display());
            }
        }
    }

    if opts.json {
        println!("{json_str}");
    }

    if !opts.quiet {
        print_summary(&result);
    }

    if opts.fail_on_unmatched && result.unmatched_count() > 0 {
        return Err(recon_err(
            EXIT_RECON_UNMATCHED,
            format!("{} unmatched row(s)", result.unmatched_count()),
        ));
    }

    Ok(())
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "recon '{}': {} matched ({} exact, {} fuzzy), {} bank-only, {} internal-only, match rate {:.1}%",
        result.meta.config_name,
        s.matched,
        s.exact_matches,
        s.fuzzy_matches,
        s.bank_only,
        s.internal_only,
        s.match_rate * 100.0,
    );
    if !s.skipped_rows.is_empty() {
        eprintln!(
            "skipped: {} bank, {} internal malformed row(s)",
            s.skipped_bank, s.skipped_internal,
        );
    }
    if !s.ambiguous_identifiers.is_empty() {
        eprintln!(
            "ambiguous identifiers: {}",
            s.ambiguous_identifiers.join(", "),
        );
    }
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let id = config.columns.id.as_deref().unwrap_or("-");
    eprintln!(
        "valid: recon '{}' (columns {}/{}/{}, id {id}; tolerance {}d / {}; threshold {})",
        config.name,
        config.columns.date,
        config.columns.value,
        config.columns.description,
        config.tolerance.date_days,
        config.tolerance.value,
        config.matching.similarity_threshold,
    );
    Ok(())
}
