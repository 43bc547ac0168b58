// In-memory adapter for unit and router tests
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::middleware::AppError;
use crate::models::RowSet;
use crate::services::database::adapter::DatabaseAdapter;
use crate::services::sql_builder::SqlStatement;

type Handler = dyn Fn(&SqlStatement) -> Result<RowSet, AppError> + Send + Sync;

/// Answers statements through a closure and records what it was asked.
pub struct FakeAdapter {
    handler: Box<Handler>,
    healthy: AtomicBool,
    executed: Mutex<Vec<SqlStatement>>,
}

impl FakeAdapter {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SqlStatement) -> Result<RowSet, AppError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            healthy: AtomicBool::new(true),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every statement yields the same rows.
    pub fn returning(rows: RowSet) -> Self {
        Self::new(move |_| Ok(rows.clone()))
    }

    /// Probes pass but every statement fails through `error`.
    pub fn failing(error: fn(String) -> AppError) -> Self {
        Self::new(move |_| Err(error("simulated failure".to_string())))
    }

    pub fn into_arc(self) -> Arc<dyn DatabaseAdapter> {
        Arc::new(self)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<SqlStatement> {
        self.executed.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for FakeAdapter {
    async fn query(&self, statement: &SqlStatement, _timeout_secs: u64) -> Result<RowSet, AppError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(statement.clone());
        }
        (self.handler)(statement)
    }

    async fn test_connection(&self, _timeout_secs: u64) -> Result<(), AppError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Unavailable("fake store is down".to_string()))
        }
    }

    fn database_type(&self) -> &str {
        "fake"
    }
}
