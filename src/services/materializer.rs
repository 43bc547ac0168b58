// Maps raw row sets into the response shapes: ordered generic rows for
// ad-hoc statements, wide records for the analytics table.
use crate::api::middleware::AppError;
use crate::models::{CellValue, GenericRow, RowSet, WideRecord};
use crate::services::database::DatabaseAdapter;
use crate::services::sql_builder::SqlStatement;

/// One ordered row per result row, columns named as the statement reported them.
pub fn generic_rows(set: &RowSet) -> Vec<GenericRow> {
    set.rows
        .iter()
        .map(|cells| {
            set.columns
                .iter()
                .zip(cells.iter())
                .fold(GenericRow::new(), |row, (column, cell)| {
                    row.with(column.as_str(), cell.clone())
                })
        })
        .collect()
}

/// Scan rows into wide records. A row that does not fit the schema is
/// logged and skipped; the rest are kept.
pub fn wide_records(set: &RowSet) -> Vec<WideRecord> {
    generic_rows(set)
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| match WideRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(row = idx, "Skipping row that failed to scan: {}", e);
                None
            }
        })
        .collect()
}

/// Value of a `COUNT(*)` style result; 0 when absent or negative.
pub fn count(set: &RowSet) -> u64 {
    set.scalar()
        .and_then(CellValue::as_i64)
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}

/// Text cell, empty for NULL or a missing column.
pub fn text(row: &GenericRow, column: &str) -> String {
    row.get(column).and_then(CellValue::as_text).unwrap_or_default()
}

pub fn unsigned(row: &GenericRow, column: &str) -> u64 {
    row.get(column)
        .and_then(CellValue::as_i64)
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}

pub fn float(row: &GenericRow, column: &str) -> f64 {
    row.get(column).and_then(CellValue::as_f64).unwrap_or(0.0)
}

pub async fn fetch_rows(
    adapter: &dyn DatabaseAdapter,
    statement: &SqlStatement,
    timeout_secs: u64,
) -> Result<Vec<GenericRow>, AppError> {
    let set = adapter.query(statement, timeout_secs).await?;
    Ok(generic_rows(&set))
}

pub async fn fetch_records(
    adapter: &dyn DatabaseAdapter,
    statement: &SqlStatement,
    timeout_secs: u64,
) -> Result<Vec<WideRecord>, AppError> {
    let set = adapter.query(statement, timeout_secs).await?;
    let records = wide_records(&set);
    tracing::debug!(fetched = set.len(), kept = records.len(), "Materialized records");
    Ok(records)
}

pub async fn fetch_count(
    adapter: &dyn DatabaseAdapter,
    statement: &SqlStatement,
    timeout_secs: u64,
) -> Result<u64, AppError> {
    let set = adapter.query(statement, timeout_secs).await?;
    Ok(count(&set))
}
