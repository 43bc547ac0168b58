use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::handlers::{present, sourced};
use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::SqlRequest;

#[derive(Debug, Default, Deserialize)]
pub struct TableParams {
    pub table: Option<String>,
}

/// Run a read-only statement from the SQL console.
pub async fn execute_sql(
    State(state): State<AppState>,
    Json(request): Json<SqlRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(page = ?request.page, page_size = ?request.page_size, "Executing ad-hoc SQL");

    let result = state.gateway.execute(&request).await?;
    Ok(sourced(
        json!({
            "success": true,
            "data": result.rows,
            "total": result.total,
            "page": result.page,
            "pageSize": result.page_size,
        }),
        result.source,
    ))
}

pub async fn list_tables(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let (tables, source) = state.gateway.tables().await?;
    Ok(sourced(json!({ "success": true, "data": tables }), source))
}

/// Columns of `table`, the analytics table by default.
pub async fn table_fields(
    State(state): State<AppState>,
    Query(params): Query<TableParams>,
) -> Result<Json<Value>, AppError> {
    let table = present(&params.table).unwrap_or(state.config.clickhouse.table.as_str());
    let (fields, source) = state.gateway.fields(table).await?;
    Ok(sourced(json!({ "success": true, "table": table, "data": fields }), source))
}

/// First rows of the analytics table for the console's initial view.
pub async fn default_query(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rows = state.analytics.default_rows().await?;
    Ok(sourced(
        json!({
            "success": true,
            "data": rows.data,
            "total": rows.data.len(),
        }),
        rows.source,
    ))
}
