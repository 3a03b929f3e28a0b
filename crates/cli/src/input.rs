//! Statement file reading: encoding fallback and delimiter detection.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Delimiters seen in bank exports, most common first.
const DELIMITER_CANDIDATES: &[u8] = &[b';', b',', b'\t', b'|'];

/// Pick the delimiter that splits the first lines into the most consistent,
/// widest records. Falls back to `,`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();
    if sample.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in DELIMITER_CANDIDATES {
        let widths: Vec<usize> = sample.iter().map(|line| field_count(line, delim)).collect();

        // The header must split for the delimiter to be plausible.
        let header_width = widths[0];
        if header_width <= 1 {
            continue;
        }

        let consistent = widths.iter().filter(|&&w| w == header_width).count();
        let score = consistent * header_width;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn field_count(line: &str, delim: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}

/// Read a statement file into a `String`.
///
/// A byte-order mark selects its encoding and is dropped. Without one the
/// bytes must be UTF-8, or they are decoded as Windows-1252 (Excel and most
/// bank portals export in the legacy code page).
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;

    let (encoding, body) = match Encoding::for_bom(&bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None if std::str::from_utf8(&bytes).is_ok() => (UTF_8, &bytes[..]),
        None => {
            log::debug!("{} is not UTF-8; decoding as Windows-1252", path.display());
            (WINDOWS_1252, &bytes[..])
        }
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        log::warn!("{}: invalid {} sequences replaced", path.display(), encoding.name());
    }
    Ok(text.into_owned())
}
