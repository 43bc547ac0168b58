use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::{analytics, health, kv7, logs, sql};
use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::{AnalyticsService, ConnectionSupervisor, SqlBuilder, SqlGateway};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub supervisor: Arc<ConnectionSupervisor>,
    pub analytics: Arc<AnalyticsService>,
    pub gateway: Arc<SqlGateway>,
}

impl AppState {
    /// State backed by the configured ClickHouse server. Connecting is
    /// deferred to the first request.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let supervisor = Arc::new(ConnectionSupervisor::new(&config.clickhouse));
        Self::with_supervisor(config, supervisor)
    }

    pub fn with_supervisor(config: Config, supervisor: Arc<ConnectionSupervisor>) -> Result<Self, AppError> {
        let builder = SqlBuilder::new(&config.clickhouse.table)?;
        let analytics = Arc::new(AnalyticsService::new(supervisor.clone(), builder, &config.query));
        let gateway = Arc::new(SqlGateway::new(supervisor.clone()));

        Ok(Self {
            config: Arc::new(config),
            supervisor,
            analytics,
            gateway,
        })
    }
}

/// Create the main application router
pub fn create_router(config: Config) -> Result<Router, AppError> {
    Ok(create_router_with_state(AppState::new(config)?))
}

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/query", get(kv7::query_get).post(kv7::query_post))
        .route("/api/query/kv7", get(kv7::query_kv7))
        .route("/api/analytics/recent", get(analytics::recent))
        .route("/api/analytics/record", get(analytics::record))
        .route("/api/analytics/events", get(analytics::events))
        .route("/api/analytics/users", get(analytics::users))
        .route("/api/analytics/search", get(analytics::search))
        .route("/api/analytics/network", get(analytics::network))
        .route("/api/analytics/ios-devices", get(analytics::ios_devices))
        .route("/api/logs", get(logs::query_logs))
        .route("/api/logs/export", get(logs::export_logs))
        .route("/api/logs/detail", get(logs::log_detail))
        .route("/api/logs/fields", get(logs::log_fields))
        .route("/api/logs/projects", get(logs::projects))
        .route("/api/logs/types", get(logs::log_types))
        .route("/api/sql", post(sql::execute_sql))
        .route("/api/sql/tables", get(sql::list_tables))
        .route("/api/sql/fields", get(sql::table_fields))
        .route("/api/sql/default", get(sql::default_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
