//! Record normalizer: raw column-mapped rows -> typed [`Transaction`]s.
//!
//! Values are parsed straight from text into integer micro-units (no f64),
//! accepting both `,` and `.` as the decimal separator. Dates are tried
//! against the configured chrono format list.

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::ColumnMapping;
use crate::error::ReconError;
use crate::model::{RawRow, Side, Transaction};

const MICROS_PER_UNIT: i64 = 1_000_000;
const MAX_FRACTION_DIGITS: usize = 6;

/// Normalize one row. `row_index` is the row's position in its source.
pub fn normalize_row(
    side: Side,
    row_index: usize,
    row: &RawRow,
    columns: &ColumnMapping,
    date_formats: &[String],
) -> Result<Transaction, ReconError> {
    let malformed = |field: &str, value: &str| ReconError::MalformedRecord {
        side,
        row: row_index,
        field: field.into(),
        value: value.into(),
    };

    let date_raw = row.get(&columns.date).unwrap_or("");
    let date = parse_date(date_raw, date_formats).ok_or_else(|| malformed("date", date_raw))?;

    let value_raw = row.get(&columns.value).unwrap_or("");
    let value_micros = parse_value(value_raw).ok_or_else(|| malformed("value", value_raw))?;

    let description = row.get(&columns.description).unwrap_or("");
    let external_id = columns.id.as_deref().and_then(|col| row.get(col));

    Ok(Transaction::new(
        side,
        row_index,
        date,
        value_micros,
        description,
        external_id,
    ))
}

/// Case-fold and collapse whitespace. Used for comparison only.
pub fn fold_description(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Dates ───────────────────────────────────────────────────────────

/// Parse a date against `formats`, then against the leading token when a
/// time component follows (`2024-01-05 10:30:00`, `2024-01-05T10:30:00`).
pub fn parse_date(s: &str, formats: &[String]) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    let head = s.split(|c: char| c == 'T' || c.is_whitespace()).next()?;
    if head.len() < s.len() {
        for fmt in formats {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return Some(d);
            }
        }
    }

    None
}

// ── Values ──────────────────────────────────────────────────────────

/// Parse a monetary amount into micro-units.
///
/// Accepts `1234.56`, `1.234,56`, `R$ 1.234,56`, `$1,234.56`, `(100.00)`,
/// `100.00-`, `1 234,5`. Returns `None` for anything else.
pub fn parse_value(s: &str) -> Option<i64> {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}')
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();

    // Strip currency tokens on either end.
    let mut body = compact.trim_matches(|c: char| !is_numeric_char(c));

    // A sign may sit in front of the currency token: "-R$ 50,00".
    let mut lead_negative = false;
    if let Some(rest) = body.strip_prefix('-') {
        if rest.starts_with(|c: char| !is_numeric_char(c)) {
            lead_negative = true;
            body = rest.trim_start_matches(|c: char| !is_numeric_char(c));
        }
    }
    if body.is_empty() {
        return None;
    }

    let (negative, digits) = split_sign(body)?;
    let negative = negative || lead_negative;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let (whole, frac) = split_decimal(digits)?;
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > MAX_FRACTION_DIGITS {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_padded = format!("{frac:0<6}");
    let frac: i64 = frac_padded.parse().ok()?;

    let micros = whole.checked_mul(MICROS_PER_UNIT)?.checked_add(frac)?;
    Some(if negative { -micros } else { micros })
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | '(' | ')')
}

/// Peel off sign markers: leading `-`/`+`, trailing `-`, or `( )`.
fn split_sign(body: &str) -> Option<(bool, &str)> {
    if let Some(inner) = body.strip_prefix('(') {
        let inner = inner.strip_suffix(')')?;
        return Some((true, inner));
    }
    if body.ends_with(')') {
        return None;
    }
    if let Some(rest) = body.strip_prefix('-') {
        return Some((true, rest.strip_prefix('+').unwrap_or(rest)));
    }
    if let Some(rest) = body.strip_prefix('+') {
        return Some((false, rest));
    }
    if let Some(rest) = body.strip_suffix('-') {
        return Some((true, rest));
    }
    Some((false, body))
}

/// Split a digit string into (whole digits, fraction digits), deciding which
/// separator (if any) is the decimal mark. Thousands grouping is validated
/// and dropped.
fn split_decimal(digits: &str) -> Option<(String, String)> {
    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');

    let decimal_pos = match (last_dot, last_comma) {
        (None, None) => None,
        (Some(d), Some(c)) => Some(d.max(c)),
        (Some(p), None) | (None, Some(p)) => {
            let sep = digits.as_bytes()[p] as char;
            let occurrences = digits.matches(sep).count();
            if occurrences > 1 || looks_like_thousands(digits, p) {
                None
            } else {
                Some(p)
            }
        }
    };

    let (whole_part, frac_part) = match decimal_pos {
        Some(p) => (&digits[..p], &digits[p + 1..]),
        None => (digits, ""),
    };

    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole = ungroup(whole_part)?;
    Some((whole, frac_part.to_string()))
}

/// Strip thousands grouping from a whole part. A grouped part uses a single
/// separator character, a leading group of one to three digits, and exactly
/// three digits in every later group.
fn ungroup(whole_part: &str) -> Option<String> {
    let Some(sep) = whole_part.chars().find(|c| !c.is_ascii_digit()) else {
        return Some(whole_part.to_string());
    };
    let mut groups = whole_part.split(sep);
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 || !lead.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut whole = lead.to_string();
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        whole.push_str(group);
    }
    Some(whole)
}

/// `1,234` / `12.500`: one separator, exactly three digits after it, and a
/// non-zero integer part of one to three digits.
fn looks_like_thousands(digits: &str, pos: usize) -> bool {
    let before = &digits[..pos];
    let after = &digits[pos + 1..];
    after.len() == 3 && (1..=3).contains(&before.len()) && !before.starts_with('0')
}
