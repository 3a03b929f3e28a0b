//! CSV export of a reconciliation result: `matched.csv`, `bank_only.csv`,
//! `internal_only.csv`. Rows keep the engine's result order.

use std::io::Write;
use std::path::{Path, PathBuf};

use bankrec_recon::model::format_micros;
use bankrec_recon::{MatchedPair, ReconResult, Transaction};

const MATCHED_HEADER: &[&str] = &[
    "match_type",
    "score",
    "bank_row",
    "bank_date",
    "bank_value",
    "bank_description",
    "bank_id",
    "internal_row",
    "internal_date",
    "internal_value",
    "internal_description",
    "internal_id",
    "date_offset_days",
    "value_delta",
];

const UNMATCHED_HEADER: &[&str] = &["row", "date", "value", "description", "id"];

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

pub fn write_matched_csv(pairs: &[MatchedPair], out: impl Write) -> Result<(), String> {
    let mut csv = writer(out);
    csv.write_record(MATCHED_HEADER)
        .map_err(|e| format!("CSV write error: {e}"))?;

    for p in pairs {
        csv.write_record([
            p.match_type.to_string(),
            format!("{:.4}", p.score),
            p.bank.source_row_index.to_string(),
            p.bank.date.to_string(),
            format_micros(p.bank.value_micros),
            p.bank.description.clone(),
            p.bank.external_id.clone().unwrap_or_default(),
            p.internal.source_row_index.to_string(),
            p.internal.date.to_string(),
            format_micros(p.internal.value_micros),
            p.internal.description.clone(),
            p.internal.external_id.clone().unwrap_or_default(),
            p.date_offset_days.to_string(),
            format_micros(p.value_delta),
        ])
        .map_err(|e| format!("CSV write error: {e}"))?;
    }

    csv.flush().map_err(|e| format!("CSV write error: {e}"))
}

pub fn write_unmatched_csv(txs: &[Transaction], out: impl Write) -> Result<(), String> {
    let mut csv = writer(out);
    csv.write_record(UNMATCHED_HEADER)
        .map_err(|e| format!("CSV write error: {e}"))?;

    for tx in txs {
        csv.write_record([
            tx.source_row_index.to_string(),
            tx.date.to_string(),
            format_micros(tx.value_micros),
            tx.description.clone(),
            tx.external_id.clone().unwrap_or_default(),
        ])
        .map_err(|e| format!("CSV write error: {e}"))?;
    }

    csv.flush().map_err(|e| format!("CSV write error: {e}"))
}

/// Write all three export files into `dir`, creating it if needed.
/// Returns the written paths.
pub fn write_csv_dir(result: &ReconResult, dir: &Path) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

    let create = |name: &str| -> Result<(PathBuf, std::fs::File), String> {
        let path = dir.join(name);
        let file = std::fs::File::create(&path)
            .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        Ok((path, file))
    };

    let (matched_path, file) = create("matched.csv")?;
    write_matched_csv(&result.matched, file)?;
    let (bank_path, file) = create("bank_only.csv")?;
    write_unmatched_csv(&result.bank_only, file)?;
    let (internal_path, file) = create("internal_only.csv")?;
    write_unmatched_csv(&result.internal_only, file)?;

    Ok(vec![matched_path, bank_path, internal_path])
}
