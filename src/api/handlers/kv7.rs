use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::handlers::sourced;
use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{parse_timestamp, QueryOptions, TimeWindow};

/// A parameter that may arrive as a JSON number/bool or as query-string text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    fn as_flag(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(n) => *n == 1,
            Scalar::Text(s) => matches!(s.trim(), "true" | "1"),
        }
    }
}

/// Parameters of `/api/query` and `/api/query/kv7`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub table: Option<String>,
    pub limit: Option<Scalar>,
    pub offset: Option<Scalar>,
    pub count: Option<Scalar>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl QueryParams {
    fn wants_count(&self) -> bool {
        self.count.as_ref().is_some_and(Scalar::as_flag)
    }

    fn window(&self) -> Result<TimeWindow, AppError> {
        Ok(TimeWindow::new(
            timestamp("start_time", self.start_time.as_deref())?,
            timestamp("end_time", self.end_time.as_deref())?,
        ))
    }

    fn options(&self, default_limit: u32) -> Result<QueryOptions, AppError> {
        let mut opts = QueryOptions::default().with_window(self.window()?);
        opts.limit = default_limit;
        if let Some(limit) = self.limit.as_ref().and_then(Scalar::as_int) {
            opts.set_limit(limit);
        }
        if let Some(offset) = self.offset.as_ref().and_then(Scalar::as_int) {
            opts.set_offset(offset);
        }
        Ok(opts)
    }
}

fn timestamp(name: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Invalid {}: {}", name, s))),
    }
}

/// Page of the analytics table; `count=true` adds `total`, `count` and
/// `dbTotalCount`, all holding the filtered total.
pub async fn query_kv7(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, AppError> {
    kv7_page(&state, &params).await
}

async fn kv7_page(state: &AppState, params: &QueryParams) -> Result<Json<Value>, AppError> {
    let opts = params.options(state.analytics.default_limit())?;
    let with_count = params.wants_count();

    tracing::info!(
        limit = opts.limit,
        offset = opts.offset,
        with_count,
        "Querying analytics table"
    );

    let page = state.analytics.kv7(&opts, with_count).await?;
    let mut body = json!({
        "success": true,
        "data": page.data.records,
        "limit": opts.limit,
        "offset": opts.offset,
    });
    if let Some(total) = page.data.total {
        body["total"] = json!(total);
        body["count"] = json!(total);
        body["dbTotalCount"] = json!(total);
    }
    Ok(sourced(body, page.source))
}

pub async fn query_get(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, AppError> {
    generic_query(&state, &params).await
}

pub async fn query_post(
    State(state): State<AppState>,
    Json(params): Json<QueryParams>,
) -> Result<Json<Value>, AppError> {
    generic_query(&state, &params).await
}

/// Rows of any table. The analytics table with a time bound or count
/// request goes through the filtered path.
async fn generic_query(state: &AppState, params: &QueryParams) -> Result<Json<Value>, AppError> {
    let configured = state.analytics.table();
    let table = params
        .table
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(configured);

    let filtered = params.start_time.is_some() || params.end_time.is_some() || params.wants_count();
    if table == configured && filtered {
        return kv7_page(state, params).await;
    }

    let opts = params.options(state.analytics.default_limit())?;
    tracing::info!(table, limit = opts.limit, offset = opts.offset, "Querying table");

    let rows = state.analytics.table_rows(table, opts.limit, opts.offset).await?;
    Ok(sourced(
        json!({
            "success": true,
            "table": table,
            "data": rows.data,
            "limit": opts.limit,
            "offset": opts.offset,
        }),
        rows.source,
    ))
}
