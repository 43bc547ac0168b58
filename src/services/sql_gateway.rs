// Caller-supplied read-only SQL. Statements are restricted to SELECT, SHOW
// and DESCRIBE; pagination is validated before it is formatted into the text.
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{ColumnInfo, GenericRow, Source, SqlRequest};
use crate::services::analytics_service::now;
use crate::services::connection_pool::ConnectionSupervisor;
use crate::services::database::DatabaseAdapter;
use crate::services::materializer::{fetch_count, fetch_rows, text};
use crate::services::mock_data;
use crate::services::sql_builder::SqlStatement;
use crate::validation::{SqlValidator, StatementVerb};

pub const SELECT_TIMEOUT_SECS: u64 = 30;
pub const COUNT_TIMEOUT_SECS: u64 = 10;
pub const DESCRIBE_TIMEOUT_SECS: u64 = 10;

/// Rows of one gateway page.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub rows: Vec<GenericRow>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub source: Source,
}

pub struct SqlGateway {
    supervisor: Arc<ConnectionSupervisor>,
}

impl SqlGateway {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Validate and run an ad-hoc statement.
    ///
    /// Validation failures are returned as errors. Store failures degrade to
    /// a mock result shaped after the statement, except for a broken cursor,
    /// which is returned.
    pub async fn execute(&self, request: &SqlRequest) -> Result<GatewayResult, AppError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("SQL query must not be empty".to_string()));
        }

        let verb = SqlValidator::statement_verb(query)?;
        let statement = SqlValidator::single_statement(query)?;
        let (page, page_size) = SqlValidator::page_bounds(request.page, request.page_size)?;

        let planned = match verb {
            StatementVerb::Describe => {
                let target = SqlValidator::describe_target(statement)?;
                Planned::Describe(SqlStatement::raw(format!("DESCRIBE TABLE {}", target)))
            }
            StatementVerb::Show => Planned::Show(SqlStatement::raw(statement)),
            StatementVerb::Select => {
                let paged = SqlValidator::ensure_limit(statement, page, page_size);
                let count = SqlValidator::extract_from_clause(statement)
                    .map(|from| SqlStatement::raw(format!("SELECT COUNT(*) FROM {}", from)));
                Planned::Select {
                    data: SqlStatement::raw(paged),
                    count,
                }
            }
        };

        tracing::info!(verb = ?verb, page, page_size, "Executing ad-hoc SQL");

        let result = |rows: Vec<GenericRow>, total: u64, source: Source| GatewayResult {
            rows,
            total,
            page,
            page_size,
            source,
        };

        let adapter = match self.supervisor.acquire().await {
            Ok(adapter) => adapter,
            Err(e) => {
                self.supervisor.record_fallback("/api/sql", &e.to_string());
                let rows = mock_data::sql_results(planned.primary().sql.as_str(), now());
                let total = rows.len() as u64;
                return Ok(result(rows, total, Source::Mock));
            }
        };

        match self.run(adapter.as_ref(), &planned).await {
            Ok((rows, total)) => Ok(result(rows, total, Source::Live)),
            Err(e) if e.is_recoverable() => {
                self.supervisor.record_fallback("/api/sql", &e.to_string());
                let rows = match &planned {
                    Planned::Describe(_) => mock_data::describe_schema(),
                    other => mock_data::sql_results(other.primary().sql.as_str(), now()),
                };
                let total = rows.len() as u64;
                Ok(result(rows, total, Source::Mock))
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, adapter: &dyn DatabaseAdapter, planned: &Planned) -> Result<(Vec<GenericRow>, u64), AppError> {
        match planned {
            Planned::Describe(statement) => {
                let rows = fetch_rows(adapter, statement, DESCRIBE_TIMEOUT_SECS).await?;
                let total = rows.len() as u64;
                Ok((rows, total))
            }
            Planned::Show(statement) => {
                let rows = fetch_rows(adapter, statement, SELECT_TIMEOUT_SECS).await?;
                let total = rows.len() as u64;
                Ok((rows, total))
            }
            Planned::Select { data, count } => {
                let rows = fetch_rows(adapter, data, SELECT_TIMEOUT_SECS).await?;
                let fallback_total = rows.len() as u64;
                let total = match count {
                    Some(count) => match fetch_count(adapter, count, COUNT_TIMEOUT_SECS).await {
                        Ok(total) => total,
                        Err(e) => {
                            tracing::warn!("Count query failed, using page length: {}", e);
                            fallback_total
                        }
                    },
                    None => fallback_total,
                };
                Ok((rows, total))
            }
        }
    }

    /// `SHOW TABLES`, or the known table list when the store is unreachable.
    pub async fn tables(&self) -> Result<(Vec<GenericRow>, Source), AppError> {
        let statement = SqlStatement::raw("SHOW TABLES");
        let attempt = match self.supervisor.acquire().await {
            Ok(adapter) => fetch_rows(adapter.as_ref(), &statement, DESCRIBE_TIMEOUT_SECS).await,
            Err(e) => Err(e),
        };

        match attempt {
            Ok(rows) => Ok((rows, Source::Live)),
            Err(e) if e.is_recoverable() => {
                self.supervisor.record_fallback("/api/sql/tables", &e.to_string());
                Ok((mock_data::table_list(), Source::Mock))
            }
            Err(e) => Err(e),
        }
    }

    /// Column names and types of `table`, or the static analytics column
    /// list when the store is unreachable.
    pub async fn fields(&self, table: &str) -> Result<(Vec<ColumnInfo>, Source), AppError> {
        let table = SqlValidator::validate_identifier(table)?;
        let statement = SqlStatement::raw(format!("DESCRIBE TABLE {}", table));
        let attempt = match self.supervisor.acquire().await {
            Ok(adapter) => fetch_rows(adapter.as_ref(), &statement, DESCRIBE_TIMEOUT_SECS).await,
            Err(e) => Err(e),
        };

        match attempt {
            Ok(rows) => Ok((
                rows.iter()
                    .map(|row| ColumnInfo::new(text(row, "name"), text(row, "type")))
                    .collect(),
                Source::Live,
            )),
            Err(e) if e.is_recoverable() => {
                self.supervisor.record_fallback("/api/sql/fields", &e.to_string());
                Ok((mock_data::table_fields(), Source::Mock))
            }
            Err(e) => Err(e),
        }
    }
}

/// A validated statement ready to run.
enum Planned {
    Describe(SqlStatement),
    Show(SqlStatement),
    Select {
        data: SqlStatement,
        count: Option<SqlStatement>,
    },
}

impl Planned {
    fn primary(&self) -> &SqlStatement {
        match self {
            Planned::Describe(statement) | Planned::Show(statement) => statement,
            Planned::Select { data, .. } => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, RowSet, WIDE_SCHEMA};
    use crate::services::database::fake::FakeAdapter;

    fn gateway_with(fake: Arc<FakeAdapter>) -> (SqlGateway, Arc<ConnectionSupervisor>) {
        let supervisor = Arc::new(ConnectionSupervisor::with_factory("fake://store", move || {
            let adapter: Arc<dyn DatabaseAdapter> = fake.clone();
            Ok(adapter)
        }));
        (SqlGateway::new(supervisor.clone()), supervisor)
    }

    fn request(query: &str, page: Option<i64>, page_size: Option<i64>) -> SqlRequest {
        SqlRequest {
            query: query.to_string(),
            page,
            page_size,
        }
    }

    fn platform_rows(n: usize) -> RowSet {
        let mut set = RowSet::new(vec!["platform".into()]);
        for _ in 0..n {
            set.rows.push(vec![CellValue::Bytes(b"ios".to_vec())]);
        }
        set
    }

    #[tokio::test]
    async fn test_rejects_write_statements() {
        let (gateway, _) = gateway_with(Arc::new(FakeAdapter::returning(RowSet::default())));
        for sql in ["update kv_7 set x=1", "DROP TABLE kv_7", "insert into kv_7 values (1)"] {
            let err = gateway.execute(&request(sql, None, None)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidSql(_)), "{}", sql);
        }
        let err = gateway.execute(&request("   ", None, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rejects_stacked_statements() {
        let (gateway, _) = gateway_with(Arc::new(FakeAdapter::returning(RowSet::default())));
        let err = gateway
            .execute(&request("SELECT 1; DROP TABLE kv_7", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSql(_) | AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_semicolon_inside_literal_is_one_statement() {
        let fake = Arc::new(FakeAdapter::returning(platform_rows(1)));
        let (gateway, _) = gateway_with(fake.clone());

        let result = gateway
            .execute(&request("SELECT platform FROM kv_7 WHERE d1 = 'a;b';", None, None))
            .await
            .unwrap();
        assert_eq!(result.source, Source::Live);
        assert_eq!(
            fake.executed()[0].sql,
            "SELECT platform FROM kv_7 WHERE d1 = 'a;b' LIMIT 10 OFFSET 0"
        );
    }

    #[tokio::test]
    async fn test_select_appends_page_and_counts() {
        let fake = Arc::new(FakeAdapter::new(|statement: &SqlStatement| {
            if statement.sql.starts_with("SELECT COUNT(*)") {
                let mut set = RowSet::new(vec!["count()".into()]);
                set.rows.push(vec![CellValue::UInt(135)]);
                Ok(set)
            } else {
                Ok(platform_rows(3))
            }
        }));
        let (gateway, _) = gateway_with(fake.clone());

        let result = gateway
            .execute(&request("  select platform from kv_7 order by platform", Some(3), Some(20)))
            .await
            .unwrap();
        assert_eq!(result.source, Source::Live);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.total, 135);
        assert_eq!((result.page, result.page_size), (3, 20));

        let executed = fake.executed();
        assert_eq!(
            executed[0].sql,
            "select platform from kv_7 order by platform LIMIT 20 OFFSET 40"
        );
        assert_eq!(executed[1].sql, "SELECT COUNT(*) FROM kv_7");
    }

    #[tokio::test]
    async fn test_count_failure_uses_page_length() {
        let fake = Arc::new(FakeAdapter::new(|statement: &SqlStatement| {
            if statement.sql.starts_with("SELECT COUNT(*)") {
                Err(AppError::Database("count timed out".into()))
            } else {
                Ok(platform_rows(4))
            }
        }));
        let (gateway, supervisor) = gateway_with(fake);

        let result = gateway
            .execute(&request("SELECT platform FROM kv_7 LIMIT 4", None, None))
            .await
            .unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.source, Source::Live);
        assert_eq!(supervisor.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_show_total_is_row_count() {
        let (gateway, _) = gateway_with(Arc::new(FakeAdapter::returning(platform_rows(6))));
        let result = gateway.execute(&request("SHOW TABLES", None, None)).await.unwrap();
        assert_eq!(result.total, 6);
    }

    #[tokio::test]
    async fn test_describe_falls_back_to_fixed_schema() {
        let fake = Arc::new(FakeAdapter::failing(AppError::Database));
        let (gateway, supervisor) = gateway_with(fake);

        let result = gateway.execute(&request("DESCRIBE kv_7", None, None)).await.unwrap();
        assert_eq!(result.source, Source::Mock);
        assert_eq!(result.rows.len(), 10);
        assert_eq!(result.total, 10);
        assert_eq!(supervisor.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_describe_live_covers_primary_fields() {
        let fake = Arc::new(FakeAdapter::new(|statement: &SqlStatement| {
            assert_eq!(statement.sql, "DESCRIBE TABLE kv_7");
            let mut set = RowSet::new(vec!["name".into(), "type".into()]);
            for field in WIDE_SCHEMA.fields() {
                set.rows.push(vec![
                    CellValue::Text(field.name.clone()),
                    CellValue::Text("String".into()),
                ]);
            }
            Ok(set)
        }));
        let (gateway, _) = gateway_with(fake);

        let result = gateway.execute(&request("describe table kv_7", None, None)).await.unwrap();
        let names: Vec<String> = result.rows.iter().map(|r| text(r, "name")).collect();
        for field in WIDE_SCHEMA.primary_fields() {
            assert!(names.contains(&field.name));
        }
    }

    #[tokio::test]
    async fn test_unavailable_store_yields_mock_rows() {
        let fake = Arc::new(FakeAdapter::returning(RowSet::default()));
        fake.set_healthy(false);
        let (gateway, supervisor) = gateway_with(fake);

        let result = gateway
            .execute(&request("SELECT * FROM kv_7", Some(1), Some(15)))
            .await
            .unwrap();
        assert_eq!(result.source, Source::Mock);
        assert_eq!(result.rows.len(), 15);
        assert_eq!(supervisor.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_cursor_error_surfaces() {
        let (gateway, _) = gateway_with(Arc::new(FakeAdapter::failing(AppError::Cursor)));
        let err = gateway
            .execute(&request("SELECT * FROM kv_7", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cursor(_)));
    }

    #[tokio::test]
    async fn test_page_bounds_enforced() {
        let (gateway, _) = gateway_with(Arc::new(FakeAdapter::returning(RowSet::default())));
        let err = gateway
            .execute(&request("SELECT * FROM kv_7", Some(100_001), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fields_fallback_and_validation() {
        let fake = Arc::new(FakeAdapter::returning(RowSet::default()));
        fake.set_healthy(false);
        let (gateway, _) = gateway_with(fake);

        let (fields, source) = gateway.fields("kv_7").await.unwrap();
        assert_eq!(source, Source::Mock);
        assert_eq!(fields.len(), 13);
        assert!(gateway.fields("kv_7 x").await.is_err());
    }
}
