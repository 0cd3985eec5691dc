use std::path::Path;

use calamine::{DataType, Reader, open_workbook_auto};
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};

/// Reads the rows of a chart upload. The first row is the header.
///
/// `.csv` files go through the CSV reader; `.xlsx`, `.xls` and `.ods` files
/// are read from their first worksheet.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "xls" | "xlsm" | "ods" => read_workbook_rows(path)?,
        _ => return Err(ToolError::UnsupportedFile(path.to_path_buf())),
    };
    debug!(row_count = rows.len(), "rows read");
    Ok(rows)
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ToolError::UnsupportedFile(path.to_path_buf()))??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell_to_string(Some(cell))).collect())
        .collect())
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => u8::from(*value).to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
