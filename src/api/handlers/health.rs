use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::api::routes::AppState;

/// Liveness plus store reachability. Always 200; an unreachable store
/// reports `warning`.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let (status, database) = match state.supervisor.acquire().await {
        Ok(_) => ("ok", "connected".to_string()),
        Err(e) => {
            tracing::warn!("Health check could not reach the store: {}", e);
            ("warning", format!("unavailable: {}", e))
        }
    };

    Json(json!({
        "status": status,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "database": database,
        "fallbackActivations": state.supervisor.fallback_count(),
    }))
}
