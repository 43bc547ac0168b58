// Database adapter trait, the seam between query logic and the driver
use crate::api::middleware::AppError;
use crate::models::RowSet;
use crate::services::sql_builder::SqlStatement;

/// Abstraction over the analytical store.
///
/// Implementations stream rows into a [`RowSet`]. Failures before the first
/// row (connect, prepare, execute, timeout) are [`AppError::Database`] or
/// [`AppError::Unavailable`]; a failure while reading the stream is
/// [`AppError::Cursor`].
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Execute a statement, binding its parameters positionally.
    async fn query(&self, statement: &SqlStatement, timeout_secs: u64) -> Result<RowSet, AppError>;

    /// Liveness probe bounded by `timeout_secs`.
    async fn test_connection(&self, timeout_secs: u64) -> Result<(), AppError>;

    /// Get database type
    fn database_type(&self) -> &str;
}
