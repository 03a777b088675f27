use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use serde_json::{Map, Value};

use crate::error::AppError;

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Turns a sheet range into one JSON object per data row, keyed by the
/// lower-cased header text, paired with the row's 1-based sheet line.
/// Empty cells and blank rows are dropped.
pub fn rows_to_records(range: &Range<Data>) -> Vec<(usize, Value)> {
    let first_line = range.start().map_or(0, |(row, _)| row as usize) + 1;
    let mut rows = range.rows();
    let headers: Vec<Option<String>> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_text(cell).map(|h| h.to_lowercase()))
            .collect(),
        None => return Vec::new(),
    };

    rows.enumerate()
        .filter_map(|(idx, row)| {
            let record: Map<String, Value> = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(header, cell)| {
                    let header = header.as_ref()?;
                    cell_text(cell).map(|text| (header.clone(), Value::String(text)))
                })
                .collect();
            // idx counts from the line after the header
            (!record.is_empty()).then_some((first_line + idx + 1, Value::Object(record)))
        })
        .collect()
}

/// Reads the first worksheet of an `.xlsx` file into import records.
pub fn read_workbook(file_data: Bytes) -> Result<Vec<(usize, Value)>, AppError> {
    let cursor = Cursor::new(file_data);
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open Excel file: {}", e);
        AppError::FileProcessing(format!("Failed to open Excel file: {}", e))
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::FileProcessing("No sheets found in workbook".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::FileProcessing(format!("Failed to read worksheet {}: {}", sheet_name, e)))?;

    let records = rows_to_records(&range);
    tracing::info!("Read {} rows from sheet {}", records.len(), sheet_name);
    Ok(records)
}
