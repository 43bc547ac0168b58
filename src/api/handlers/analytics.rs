use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::handlers::{lenient_int, lenient_rfc3339, present, sourced, strict_int, strict_rfc3339};
use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{EqualityField, QueryOptions, TimeWindow};

#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub category: Option<String>,
    pub action: Option<String>,
    pub platform: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl WindowParams {
    /// Last 24 hours when neither bound is given.
    fn window(&self) -> Result<TimeWindow, AppError> {
        let window = TimeWindow::new(
            strict_rfc3339("start_time", &self.start_time)?,
            strict_rfc3339("end_time", &self.end_time)?,
        );
        Ok(if window.is_unbounded() {
            TimeWindow::last_hours(24)
        } else {
            window
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IdParams {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub category: Option<String>,
    pub action: Option<String>,
    pub platform: Option<String>,
    pub app_id: Option<String>,
    pub user_id: Option<String>,
    pub os: Option<String>,
    pub version: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Filters shared by the network and device statistics.
#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub platform: Option<String>,
    pub os: Option<String>,
    pub user_id: Option<String>,
}

fn set_equalities(opts: &mut QueryOptions, pairs: &[(EqualityField, &Option<String>)]) {
    for (field, raw) in pairs {
        if let Some(value) = present(raw) {
            opts.set_equality(*field, value);
        }
    }
}

impl RecentParams {
    fn options(&self) -> Result<QueryOptions, AppError> {
        let mut opts = QueryOptions::default().with_window(TimeWindow::new(
            strict_rfc3339("start_time", &self.start_time)?,
            strict_rfc3339("end_time", &self.end_time)?,
        ));
        set_equalities(
            &mut opts,
            &[
                (EqualityField::Category, &self.category),
                (EqualityField::Action, &self.action),
                (EqualityField::Platform, &self.platform),
            ],
        );
        if let Some(limit) = strict_int("limit", &self.limit)? {
            if limit <= 0 {
                return Err(AppError::Validation(format!("Invalid limit: {}", limit)));
            }
            opts.set_limit(limit);
        }
        Ok(opts)
    }
}

impl SearchParams {
    fn options(&self) -> Result<QueryOptions, AppError> {
        let mut opts = QueryOptions::default().with_window(TimeWindow::new(
            lenient_rfc3339(&self.start_time),
            lenient_rfc3339(&self.end_time),
        ));
        set_equalities(
            &mut opts,
            &[
                (EqualityField::Category, &self.category),
                (EqualityField::Action, &self.action),
                (EqualityField::Platform, &self.platform),
                (EqualityField::AppId, &self.app_id),
                (EqualityField::UserId, &self.user_id),
                (EqualityField::Os, &self.os),
                (EqualityField::Version, &self.version),
            ],
        );
        if let Some(limit) = lenient_int(&self.limit) {
            opts.set_limit(limit);
        }
        if let Some(offset) = lenient_int(&self.offset) {
            opts.set_offset(offset);
        }
        if let Some(field) = present(&self.sort_by) {
            opts.set_sort_field(field)?;
        }
        if let Some(order) = present(&self.sort_order) {
            opts.set_sort_direction(order);
        }
        Ok(opts)
    }
}

impl StatsParams {
    fn options(&self) -> QueryOptions {
        let window = TimeWindow::new(lenient_rfc3339(&self.start_time), lenient_rfc3339(&self.end_time));
        let mut opts = if window.is_unbounded() {
            QueryOptions::last_day()
        } else {
            QueryOptions::default().with_window(window)
        };
        set_equalities(
            &mut opts,
            &[
                (EqualityField::Platform, &self.platform),
                (EqualityField::Os, &self.os),
                (EqualityField::UserId, &self.user_id),
            ],
        );
        opts
    }
}

/// Most recent events, listing projection.
pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Value>, AppError> {
    let opts = params.options()?;
    tracing::info!(limit = opts.limit, "Fetching recent events");

    let records = state.analytics.recent(&opts).await?;
    Ok(sourced(json!({ "success": true, "data": records.data }), records.source))
}

pub async fn record(
    State(state): State<AppState>,
    Query(params): Query<IdParams>,
) -> Result<Json<Value>, AppError> {
    let id = present(&params.id)
        .ok_or_else(|| AppError::Validation("id is required".to_string()))?;
    tracing::info!(id, "Fetching record");

    let record = state.analytics.record(id).await?;
    Ok(sourced(json!({ "success": true, "data": record.data }), record.source))
}

/// Counts per `(category, action)`.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, AppError> {
    let window = params.window()?;
    let counts = state.analytics.events(window).await?;
    Ok(sourced(json!({ "success": true, "data": counts.data }), counts.source))
}

/// Distinct users per operating system.
pub async fn users(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, AppError> {
    let window = params.window()?;
    let distribution = state.analytics.users(window).await?;
    Ok(sourced(
        json!({ "success": true, "data": distribution.data }),
        distribution.source,
    ))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let opts = params.options()?;
    tracing::info!(
        limit = opts.limit,
        offset = opts.offset,
        sort = opts.sort_field(),
        "Searching records"
    );

    let page = state.analytics.search(&opts).await?;
    Ok(sourced(
        json!({
            "success": true,
            "data": page.data.records,
            "total": page.data.total.unwrap_or(0),
            "limit": opts.limit,
            "offset": opts.offset,
        }),
        page.source,
    ))
}

pub async fn network(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, AppError> {
    let stats = state.analytics.network(&params.options()).await?;
    Ok(sourced(json!({ "success": true, "data": stats.data }), stats.source))
}

pub async fn ios_devices(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, AppError> {
    let stats = state.analytics.ios_devices(&params.options()).await?;
    Ok(sourced(json!({ "success": true, "data": stats.data }), stats.source))
}
