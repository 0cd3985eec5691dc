//! Turns raw spreadsheet rows into a [`FlatTable`].
//!
//! The first row is the header. Its first cell always names the record and is
//! ignored; the remaining header cells are scrubbed into field keys. A data row
//! whose first cell is blank continues the nearest named row above it.

use tracing::{debug, instrument, warn};

use crate::error::{Result, ToolError};
use crate::model::{
    Attributes, DISTRIBUTION_ENABLED_FIELD, FlatTable, GROUP_FIELD, GroupFlag, PARENT_FIELD,
    Record, parse_integer,
};

/// Normalises a header cell into a field key: trimmed, lowercase, with spaces
/// and dashes replaced by underscores.
pub fn scrub(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '-' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Decodes the rows of a chart spreadsheet.
#[instrument(level = "debug", skip_all, fields(row_count = rows.len()))]
pub fn decode(rows: &[Vec<String>]) -> Result<FlatTable> {
    let mut table = FlatTable::new();
    let Some((header, data)) = rows.split_first() else {
        return Ok(table);
    };

    let keys: Vec<String> = header.iter().skip(1).map(|cell| scrub(cell)).collect();
    let mut has_named_row = false;

    for (offset, row) in data.iter().enumerate() {
        // Row numbers as shown by a spreadsheet, header included.
        let row_number = offset + 2;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            warn!(row = row_number, "skipping blank row");
            continue;
        }

        let attributes: Attributes = keys
            .iter()
            .zip(row.iter().skip(1))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, cell)| (key.clone(), cell.clone()))
            .collect();

        let name = row.first().map(|cell| cell.trim()).unwrap_or_default();
        if name.is_empty() {
            if !has_named_row {
                return Err(ToolError::ContinuationWithoutRecord { row: row_number });
            }
            if let Some(previous) = table.last_mut() {
                previous.continuations.push(attributes);
            }
            continue;
        }

        let record = build_record(name, attributes)?;
        table
            .insert(record)
            .map_err(|record| ToolError::DuplicateName(record.name))?;
        has_named_row = true;
    }

    debug!(record_count = table.len(), "decoded chart rows");
    Ok(table)
}

fn build_record(name: &str, mut attributes: Attributes) -> Result<Record> {
    let parent = attributes
        .remove(PARENT_FIELD)
        .map(|parent| parent.trim().to_string())
        .filter(|parent| !parent.is_empty());

    let group = match integer_cell(&mut attributes, GROUP_FIELD) {
        Ok(Some(value)) => GroupFlag::from_int(value),
        Ok(None) => GroupFlag::Unspecified,
        Err(value) => {
            return Err(ToolError::InvalidGroupFlag {
                record: name.to_string(),
                value,
            });
        }
    };

    let distribution = match integer_cell(&mut attributes, DISTRIBUTION_ENABLED_FIELD) {
        Ok(value) => value.is_some_and(|value| value != 0),
        Err(value) => {
            return Err(ToolError::InvalidDistributionFlag {
                record: name.to_string(),
                value,
            });
        }
    };

    Ok(Record {
        name: name.to_string(),
        parent,
        group,
        distribution,
        attributes,
        continuations: Vec::new(),
    })
}

/// Removes an integer flag cell. Blank is `Ok(None)`; unparseable text comes
/// back as the error.
fn integer_cell(
    attributes: &mut Attributes,
    field: &str,
) -> std::result::Result<Option<i64>, String> {
    match attributes.remove(field) {
        Some(cell) if !cell.trim().is_empty() => parse_integer(&cell).map(Some).ok_or(cell),
        _ => Ok(None),
    }
}
