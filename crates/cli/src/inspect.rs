//! `bankrec inspect`: header, row count and a preview of a statement file,
//! for writing the `[columns]` mapping of a recon config.

use std::path::PathBuf;

use serde::Serialize;

use crate::exit_codes::{EXIT_ERROR, EXIT_RECON_RUNTIME, EXIT_USAGE};
use crate::input::{read_file_as_utf8, sniff_delimiter};
use crate::CliError;

#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub file: String,
    pub delimiter: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview: Vec<Vec<String>>,
}

/// Summarize CSV text: trimmed header names, data row count and up to
/// `preview_rows` leading records as written.
pub fn inspect_text(
    file: &str,
    text: &str,
    delimiter: u8,
    preview_rows: usize,
) -> Result<InspectResult, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let columns = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut row_count = 0;
    let mut preview = Vec::new();
    for record in reader.records() {
        let record = record?;
        if preview.len() < preview_rows {
            preview.push(record.iter().map(String::from).collect());
        }
        row_count += 1;
    }

    Ok(InspectResult {
        file: file.to_string(),
        delimiter: (delimiter as char).to_string(),
        columns,
        row_count,
        preview,
    })
}

pub fn cmd_inspect(
    file: PathBuf,
    rows: usize,
    delimiter: Option<char>,
    json: bool,
) -> Result<(), CliError> {
    let text = read_file_as_utf8(&file).map_err(|e| CliError {
        code: EXIT_RECON_RUNTIME,
        message: format!("cannot read {}: {e}", file.display()),
        hint: None,
    })?;

    let delimiter = match delimiter {
        Some(c) => u8::try_from(c).ok().filter(u8::is_ascii).ok_or_else(|| CliError {
            code: EXIT_USAGE,
            message: format!("--delimiter must be an ASCII character, got {c:?}"),
            hint: None,
        })?,
        None => sniff_delimiter(&text),
    };

    let result = inspect_text(&file.display().to_string(), &text, delimiter, rows).map_err(|e| {
        CliError {
            code: EXIT_RECON_RUNTIME,
            message: format!("{}: {e}", file.display()),
            hint: None,
        }
    })?;

    if json {
        let out = serde_json::to_string_pretty(&result).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{out}");
        return Ok(());
    }

    println!("File:      {}", result.file);
    println!("Delimiter: {:?}", delimiter as char);
    println!("Rows:      {}", result.row_count);
    println!("Columns:   {}", result.columns.join(", "));
    if !result.preview.is_empty() {
        println!();
        for record in &result.preview {
            println!("  {}", record.join(" | "));
        }
    }
    Ok(())
}
