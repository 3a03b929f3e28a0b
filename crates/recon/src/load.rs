use crate::config::ColumnMapping;
use crate::error::ReconError;
use crate::model::{RawRow, Side};

/// Load CSV text into column-mapped rows for one side.
///
/// Only mapped columns are kept. The date, value and description columns must
/// be present in the header; a configured id column that is absent is logged
/// and treated as absent on every row.
pub fn load_csv_rows(
    side: Side,
    csv_data: &str,
    columns: &ColumnMapping,
    delimiter: u8,
) -> Result<Vec<RawRow>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::MissingColumn {
                side,
                column: name.into(),
            })
    };

    let mut mapped = vec![
        (columns.date.as_str(), idx(&columns.date)?),
        (columns.value.as_str(), idx(&columns.value)?),
        (columns.description.as_str(), idx(&columns.description)?),
    ];

    if let Some(ref id_col) = columns.id {
        match headers.iter().position(|h| h == id_col) {
            Some(i) => mapped.push((id_col.as_str(), i)),
            None => log::warn!(
                "{side} input has no '{id_col}' column; identifier matching disabled for this side"
            ),
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let mut row = RawRow::new();
        // Short records leave trailing fields absent; the normalizer reports
        // a missing date or value and treats a missing description as empty.
        for &(name, i) in &mapped {
            if let Some(field) = record.get(i) {
                row.fields.insert(name.to_string(), field.to_string());
            }
        }
        rows.push(row);
    }

    log::debug!("loaded {} {side} rows", rows.len());
    Ok(rows)
}
