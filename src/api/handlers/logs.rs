use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::handlers::analytics::IdParams;
use crate::api::handlers::{lenient_int, present, sourced, truthy};
use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{EqualityField, FieldLabel, QueryOptions, TimeWindow};
use crate::services::{csv_export, mock_data};

/// Minute-precision local form used by the log viewer's date pickers.
const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub user_id: Option<String>,
    pub platform: Option<String>,
    pub os: Option<String>,
    pub category: Option<String>,
    pub action: Option<String>,
    pub project: Option<String>,
    pub log_type: Option<String>,
    pub msg_filter: Option<String>,
    pub device_id: Option<String>,
    pub model: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub count: Option<String>,
}

fn log_time(raw: &Option<String>) -> Option<NaiveDateTime> {
    present(raw).and_then(|s| NaiveDateTime::parse_from_str(s, LOG_TIME_FORMAT).ok())
}

/// Severity filter value; `all` and unknown types filter nothing.
fn severity(log_type: &str) -> Option<&'static str> {
    match log_type.to_ascii_lowercase().as_str() {
        "error" => Some("ERROR"),
        "warning" => Some("WARNING"),
        "info" => Some("INFO"),
        "debug" => Some("DEBUG"),
        _ => None,
    }
}

impl LogParams {
    fn options(&self) -> Result<QueryOptions, AppError> {
        let mut opts = QueryOptions::default()
            .with_window(TimeWindow::new(log_time(&self.start_time), log_time(&self.end_time)));
        opts.paginate(lenient_int(&self.page), lenient_int(&self.page_size));

        for (field, raw) in [
            (EqualityField::UserId, &self.user_id),
            (EqualityField::Platform, &self.platform),
            (EqualityField::Os, &self.os),
            (EqualityField::Category, &self.category),
            (EqualityField::Action, &self.action),
        ] {
            if let Some(value) = present(raw) {
                opts.set_equality(field, value);
            }
        }

        if let Some(project) = present(&self.project).filter(|p| *p != "all") {
            opts.set_equality(EqualityField::AppId, project);
        }
        if let Some(level) = present(&self.log_type).and_then(severity) {
            opts.set_equality(EqualityField::Category, level);
        }

        for (key, raw) in [
            ("msg", &self.msg_filter),
            ("device_id", &self.device_id),
            ("model", &self.model),
        ] {
            if let Some(value) = present(raw) {
                opts.apply_filter(key, value);
            }
        }

        if let Some(field) = present(&self.sort_field) {
            opts.set_sort_field(field)?;
        }
        if let Some(order) = present(&self.sort_order) {
            opts.set_sort_direction(order);
        }
        Ok(opts)
    }
}

/// Paged log listing; `count=true` adds the whole-table `dbTotalCount`.
pub async fn query_logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Result<Json<Value>, AppError> {
    let opts = params.options()?;
    let with_db_total = truthy(&params.count);
    tracing::info!(
        limit = opts.limit,
        offset = opts.offset,
        sort = opts.sort_field(),
        with_db_total,
        "Querying logs"
    );

    let page = state.analytics.logs(&opts, with_db_total).await?;
    let mut body = json!({
        "success": true,
        "data": page.data.records,
        "total": page.data.total,
    });
    if let Some(db_total) = page.data.db_total {
        body["dbTotalCount"] = json!(db_total);
    }
    Ok(sourced(body, page.source))
}

/// CSV download of the filtered logs.
pub async fn export_logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Result<Response, AppError> {
    let opts = params.options()?;
    let records = state.analytics.export(&opts).await?;
    tracing::info!(rows = records.data.len(), source = ?records.source, "Exporting logs");

    let body = csv_export::render(&records.data);
    let disposition = format!("attachment; filename={}", csv_export::EXPORT_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn log_detail(
    State(state): State<AppState>,
    Query(params): Query<IdParams>,
) -> Result<Json<Value>, AppError> {
    let id = present(&params.id)
        .ok_or_else(|| AppError::Validation("id is required".to_string()))?;
    let record = state.analytics.record(id).await?;
    Ok(sourced(json!({ "success": true, "data": record.data }), record.source))
}

/// Displayable log fields. Static, so always `live`.
pub async fn log_fields() -> Json<Value> {
    let fields: Vec<FieldLabel> = mock_data::log_fields()
        .into_iter()
        .map(|(key, label)| FieldLabel {
            key: key.to_string(),
            label: label.to_string(),
        })
        .collect();
    Json(json!({ "success": true, "data": fields }))
}

pub async fn projects() -> Json<Value> {
    Json(json!({ "success": true, "data": mock_data::project_options() }))
}

pub async fn log_types() -> Json<Value> {
    Json(json!({ "success": true, "data": mock_data::log_type_options() }))
}
