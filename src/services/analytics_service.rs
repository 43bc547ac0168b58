use chrono::NaiveDateTime;
use std::future::Future;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::QueryConfig;
use crate::models::{
    parse_timestamp, AnalyticsResult, CategoryCount, CellValue, DeviceStats,
    GenericRow, HourlyStat, ModelCount, NetworkStats, NetworkTypeCount, Projection, QueryOptions,
    RegionStat, ResponseTimes, Sourced, TimeWindow, UserDistribution, VersionCount, WideRecord,
};
use crate::services::connection_pool::ConnectionSupervisor;
use crate::services::database::DatabaseAdapter;
use crate::services::materializer::{fetch_count, fetch_records, fetch_rows, float, text, unsigned};
use crate::services::mock_data;
use crate::services::sql_builder::{ios_options, network_options, SqlBuilder};

pub const LIST_TIMEOUT_SECS: u64 = 30;
pub const COUNT_TIMEOUT_SECS: u64 = 10;
pub const RECORD_TIMEOUT_SECS: u64 = 10;
pub const AGGREGATE_TIMEOUT_SECS: u64 = 20;

/// Row cap for CSV export.
pub const EXPORT_ROW_CAP: u32 = 10_000;
/// Mock log page size when the store fails.
const MOCK_LOG_ROWS: usize = 25;
const TOP_N: u32 = 10;

/// Why a response is synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degrade {
    /// Live queries are switched off for this endpoint family.
    Disabled,
    /// The store was unreachable or the statement failed.
    Failed,
}

/// A page of records with the optional filtered count.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<WideRecord>,
    pub total: Option<u64>,
}

/// A page of log records. `total` counts the filtered rows, `db_total` the
/// whole table.
#[derive(Debug, Clone)]
pub struct LogPage {
    pub records: Vec<WideRecord>,
    pub total: u64,
    pub db_total: Option<u64>,
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        "Unknown".to_string()
    } else {
        value
    }
}

/// `YYYY-MM-DD HH:00` for an hour bucket, whatever form the driver returned.
fn hour_label(row: &GenericRow) -> String {
    match row.get("hour") {
        Some(CellValue::Timestamp(ts)) => ts.format("%Y-%m-%d %H:00").to_string(),
        Some(cell) => {
            let raw = cell.as_text().unwrap_or_default();
            parse_timestamp(&raw)
                .map(|ts| ts.format("%Y-%m-%d %H:00").to_string())
                .unwrap_or(raw)
        }
        None => String::new(),
    }
}

/// Runs the analytics table queries behind the listing, log and statistics
/// endpoints, degrading to generated data when the store cannot answer.
pub struct AnalyticsService {
    supervisor: Arc<ConnectionSupervisor>,
    builder: SqlBuilder,
    use_real_database: bool,
    default_limit: u32,
}

impl AnalyticsService {
    pub fn new(supervisor: Arc<ConnectionSupervisor>, builder: SqlBuilder, settings: &QueryConfig) -> Self {
        Self {
            supervisor,
            builder,
            use_real_database: settings.use_real_database,
            default_limit: settings.default_limit,
        }
    }

    pub fn table(&self) -> &str {
        self.builder.table()
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Fallback policy shared by every endpoint.
    ///
    /// `gated` endpoints serve `mock` directly while live queries are
    /// disabled. Otherwise an unavailable store or a recoverable statement
    /// failure is counted and answered with `mock`; any other error,
    /// including a broken cursor, is returned.
    async fn live_or_mock<T, L, Fut, M>(
        &self,
        endpoint: &str,
        gated: bool,
        live: L,
        mock: M,
    ) -> Result<Sourced<T>, AppError>
    where
        L: FnOnce(Arc<dyn DatabaseAdapter>) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
        M: FnOnce(Degrade) -> T,
    {
        if gated && !self.use_real_database {
            tracing::debug!(endpoint, "Live queries disabled, serving mock data");
            return Ok(Sourced::mock(mock(Degrade::Disabled)));
        }

        let adapter = match self.supervisor.acquire().await {
            Ok(adapter) => adapter,
            Err(e) => {
                self.supervisor.record_fallback(endpoint, &e.to_string());
                return Ok(Sourced::mock(mock(Degrade::Failed)));
            }
        };

        match live(adapter).await {
            Ok(data) => Ok(Sourced::live(data)),
            Err(e) if e.is_recoverable() => {
                self.supervisor.record_fallback(endpoint, &e.to_string());
                Ok(Sourced::mock(mock(Degrade::Failed)))
            }
            Err(e) => Err(e),
        }
    }

    /// Filtered page of full records; with `with_count` the filtered total.
    pub async fn kv7(&self, opts: &QueryOptions, with_count: bool) -> Result<Sourced<RecordPage>, AppError> {
        let built = self.builder.build(opts, Projection::Full, with_count);
        let limit = opts.limit as usize;

        self.live_or_mock(
            "/api/query/kv7",
            false,
            |adapter| async move {
                let data = fetch_records(adapter.as_ref(), &built.data, LIST_TIMEOUT_SECS);
                match &built.count {
                    Some(count) => {
                        let (records, total) = futures::try_join!(
                            data,
                            fetch_count(adapter.as_ref(), count, COUNT_TIMEOUT_SECS)
                        )?;
                        Ok(RecordPage {
                            records,
                            total: Some(total),
                        })
                    }
                    None => Ok(RecordPage {
                        records: data.await?,
                        total: None,
                    }),
                }
            },
            move |_| {
                let records = mock_data::kv7_records(&mut rand::thread_rng(), limit, now());
                let total = with_count.then_some(records.len() as u64);
                RecordPage { records, total }
            },
        )
        .await
    }

    /// `SELECT *` page of an arbitrary table.
    pub async fn table_rows(&self, table: &str, limit: u32, offset: u64) -> Result<Sourced<Vec<GenericRow>>, AppError> {
        let statement = SqlBuilder::new(table)?.select_all(limit, offset);
        self.live_or_mock(
            "/api/query",
            false,
            |adapter| async move { fetch_rows(adapter.as_ref(), &statement, LIST_TIMEOUT_SECS).await },
            move |_| {
                let rows = (limit as usize).min(mock_data::MAX_MOCK_ROWS);
                mock_data::wide_rows(rows, now())
            },
        )
        .await
    }

    /// First `DEFAULT_LIMIT` rows of the analytics table.
    pub async fn default_rows(&self) -> Result<Sourced<Vec<GenericRow>>, AppError> {
        let statement = self.builder.select_all(self.default_limit, 0);
        let limit = self.default_limit as usize;
        self.live_or_mock(
            "/api/sql/default",
            false,
            |adapter| async move { fetch_rows(adapter.as_ref(), &statement, LIST_TIMEOUT_SECS).await },
            move |_| mock_data::wide_rows(limit.min(mock_data::MAX_MOCK_ROWS), now()),
        )
        .await
    }

    pub async fn recent(&self, opts: &QueryOptions) -> Result<Sourced<Vec<WideRecord>>, AppError> {
        let built = self.builder.build(opts, Projection::Listing, false);
        let limit = opts.limit as usize;
        self.live_or_mock(
            "/api/analytics/recent",
            true,
            |adapter| async move { fetch_records(adapter.as_ref(), &built.data, LIST_TIMEOUT_SECS).await },
            move |_| mock_data::kv7_records(&mut rand::thread_rng(), limit, now()),
        )
        .await
    }

    /// Core-field search with the filtered total.
    pub async fn search(&self, opts: &QueryOptions) -> Result<Sourced<RecordPage>, AppError> {
        let built = self.builder.build(opts, Projection::Core, true);
        let limit = opts.limit as usize;
        self.live_or_mock(
            "/api/analytics/search",
            true,
            |adapter| async move {
                let data = fetch_records(adapter.as_ref(), &built.data, LIST_TIMEOUT_SECS);
                let (records, total) = match &built.count {
                    Some(count) => {
                        let (records, total) = futures::try_join!(
                            data,
                            fetch_count(adapter.as_ref(), count, COUNT_TIMEOUT_SECS)
                        )?;
                        (records, Some(total))
                    }
                    None => (data.await?, None),
                };
                Ok(RecordPage { records, total })
            },
            move |_| {
                let records = mock_data::kv7_records(&mut rand::thread_rng(), limit, now());
                let total = Some(records.len() as u64);
                RecordPage { records, total }
            },
        )
        .await
    }

    /// Full record by id. A live miss is `NotFound`; an unavailable store
    /// yields a generated record carrying the requested id.
    pub async fn record(&self, id: &str) -> Result<Sourced<WideRecord>, AppError> {
        if id.trim().is_empty() {
            return Err(AppError::Validation("id is required".to_string()));
        }
        let statement = self.builder.record_by_id(id);
        let wanted = id.to_string();

        self.live_or_mock(
            "/api/analytics/record",
            false,
            |adapter| async move {
                fetch_records(adapter.as_ref(), &statement, RECORD_TIMEOUT_SECS)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::NotFound(format!("Record {} not found", wanted)))
            },
            {
                let id = id.to_string();
                move |_| {
                    mock_data::kv7_records(&mut rand::thread_rng(), 1, now())
                        .into_iter()
                        .next()
                        .unwrap_or_default()
                        .with_text("id", id)
                }
            },
        )
        .await
    }

    pub async fn events(&self, window: TimeWindow) -> Result<Sourced<Vec<AnalyticsResult>>, AppError> {
        let statement = self.builder.event_counts(window);
        self.live_or_mock(
            "/api/analytics/events",
            true,
            |adapter| async move {
                let rows = fetch_rows(adapter.as_ref(), &statement, AGGREGATE_TIMEOUT_SECS).await?;
                Ok(rows
                    .iter()
                    .map(|row| AnalyticsResult {
                        category: text(row, "category"),
                        action: text(row, "action"),
                        count: unsigned(row, "count"),
                    })
                    .collect())
            },
            |_| mock_data::event_counts(&mut rand::thread_rng(), now()),
        )
        .await
    }

    pub async fn users(&self, window: TimeWindow) -> Result<Sourced<Vec<UserDistribution>>, AppError> {
        let statement = self.builder.user_distribution(window);
        self.live_or_mock(
            "/api/analytics/users",
            true,
            |adapter| async move {
                let rows = fetch_rows(adapter.as_ref(), &statement, AGGREGATE_TIMEOUT_SECS).await?;
                Ok(rows
                    .iter()
                    .map(|row| UserDistribution {
                        os: text(row, "os"),
                        count: unsigned(row, "users"),
                        percent: float(row, "percent"),
                    })
                    .collect())
            },
            |_| mock_data::user_distribution(&mut rand::thread_rng(), now()),
        )
        .await
    }

    /// Network performance for the `PERF_NET_SSE` event.
    pub async fn network(&self, opts: &QueryOptions) -> Result<Sourced<NetworkStats>, AppError> {
        let opts = network_options(opts);
        let types = self.builder.network_types(&opts);
        let timings = self.builder.response_times(&opts);
        let regions = self.builder.region_performance(&opts);
        let hours = self.builder.hourly_performance(&opts);

        self.live_or_mock(
            "/api/analytics/network",
            true,
            |adapter| async move {
                let db = adapter.as_ref();
                let (types, timings, regions, hours) = futures::try_join!(
                    fetch_rows(db, &types, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &timings, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &regions, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &hours, AGGREGATE_TIMEOUT_SECS),
                )?;

                let response_time = timings
                    .first()
                    .map(|row| ResponseTimes {
                        total: float(row, "avg_total"),
                        dns: float(row, "avg_dns"),
                        tcp: float(row, "avg_tcp"),
                        request: float(row, "avg_request"),
                        response: float(row, "avg_response"),
                    })
                    .unwrap_or_default();

                Ok(NetworkStats {
                    network_types: types
                        .iter()
                        .map(|row| NetworkTypeCount {
                            network_type: or_unknown(text(row, "network_type")),
                            count: unsigned(row, "count"),
                        })
                        .collect(),
                    response_time,
                    regions: regions
                        .iter()
                        .map(|row| RegionStat {
                            region: or_unknown(text(row, "region")),
                            avg_time: float(row, "avg_total"),
                            count: unsigned(row, "count"),
                        })
                        .collect(),
                    time_series: hours
                        .iter()
                        .map(|row| HourlyStat {
                            hour: hour_label(row),
                            avg_time: float(row, "avg_total"),
                            count: unsigned(row, "count"),
                        })
                        .collect(),
                })
            },
            |_| mock_data::network_stats(&mut rand::thread_rng(), now()),
        )
        .await
    }

    /// Top device models, OS versions, app versions and categories on iOS.
    pub async fn ios_devices(&self, opts: &QueryOptions) -> Result<Sourced<DeviceStats>, AppError> {
        let opts = ios_options(opts);
        let models = self.builder.top_values("model", &opts, TOP_N);
        let os_versions = self.builder.top_values("os_ver", &opts, TOP_N);
        let app_versions = self.builder.top_values("version", &opts, TOP_N);
        let categories = self.builder.top_values("category", &opts, TOP_N);

        self.live_or_mock(
            "/api/analytics/ios-devices",
            true,
            |adapter| async move {
                let db = adapter.as_ref();
                let (models, os_versions, app_versions, categories) = futures::try_join!(
                    fetch_rows(db, &models, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &os_versions, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &app_versions, AGGREGATE_TIMEOUT_SECS),
                    fetch_rows(db, &categories, AGGREGATE_TIMEOUT_SECS),
                )?;

                let versions = |rows: &[GenericRow]| -> Vec<VersionCount> {
                    rows.iter()
                        .map(|row| VersionCount {
                            version: or_unknown(text(row, "item")),
                            count: unsigned(row, "count"),
                        })
                        .collect()
                };

                Ok(DeviceStats {
                    devices: models
                        .iter()
                        .map(|row| ModelCount {
                            model: or_unknown(text(row, "item")),
                            count: unsigned(row, "count"),
                        })
                        .collect(),
                    os_versions: versions(&os_versions),
                    app_versions: versions(&app_versions),
                    categories: categories
                        .iter()
                        .map(|row| CategoryCount {
                            category: or_unknown(text(row, "item")),
                            count: unsigned(row, "count"),
                        })
                        .collect(),
                })
            },
            |_| mock_data::ios_device_stats(),
        )
        .await
    }

    /// Log page with the filtered total, plus the whole-table count when
    /// `with_db_total` is set.
    pub async fn logs(&self, opts: &QueryOptions, with_db_total: bool) -> Result<Sourced<LogPage>, AppError> {
        let built = self.builder.build(opts, Projection::Logs, true);
        let whole_table = with_db_total.then(|| self.builder.whole_table_count());
        let limit = opts.limit as usize;

        self.live_or_mock(
            "/api/logs",
            true,
            |adapter| async move {
                let db = adapter.as_ref();
                let data = fetch_records(db, &built.data, LIST_TIMEOUT_SECS);
                let (records, total) = match &built.count {
                    Some(count) => futures::try_join!(data, fetch_count(db, count, COUNT_TIMEOUT_SECS))?,
                    None => {
                        let records = data.await?;
                        let total = records.len() as u64;
                        (records, total)
                    }
                };
                let db_total = match &whole_table {
                    Some(statement) => Some(fetch_count(db, statement, COUNT_TIMEOUT_SECS).await?),
                    None => None,
                };
                Ok(LogPage {
                    records,
                    total,
                    db_total,
                })
            },
            move |reason| {
                let (rows, db_total) = match reason {
                    Degrade::Disabled => {
                        let rows = limit.min(MOCK_LOG_ROWS);
                        (rows, rows as u64 * 40)
                    }
                    Degrade::Failed => (MOCK_LOG_ROWS, 1000),
                };
                let records = mock_data::log_records(&mut rand::thread_rng(), rows, now());
                LogPage {
                    total: records.len() as u64,
                    records,
                    db_total: with_db_total.then_some(db_total),
                }
            },
        )
        .await
    }

    /// Log rows for CSV export, first page only, capped at [`EXPORT_ROW_CAP`].
    pub async fn export(&self, opts: &QueryOptions) -> Result<Sourced<Vec<WideRecord>>, AppError> {
        let mut opts = opts.clone();
        opts.limit = EXPORT_ROW_CAP;
        opts.offset = 0;
        let built = self.builder.build(&opts, Projection::Logs, false);

        self.live_or_mock(
            "/api/logs/export",
            true,
            |adapter| async move { fetch_records(adapter.as_ref(), &built.data, LIST_TIMEOUT_SECS).await },
            |_| mock_data::log_records(&mut rand::thread_rng(), MOCK_LOG_ROWS, now()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{EqualityField, RowSet};
    use crate::services::database::fake::FakeAdapter;
    use crate::services::sql_builder::SqlStatement;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service_with(adapter: Arc<FakeAdapter>, use_real_database: bool) -> (AnalyticsService, Arc<ConnectionSupervisor>) {
        let supervisor = Arc::new(ConnectionSupervisor::with_factory("fake://store", move || {
            let adapter: Arc<dyn DatabaseAdapter> = adapter.clone();
            Ok(adapter)
        }));
        let config = Config::for_tests(use_real_database);
        let service = AnalyticsService::new(
            supervisor.clone(),
            SqlBuilder::new("kv_7").unwrap(),
            &config.query,
        );
        (service, supervisor)
    }

    fn count_rows(n: u64) -> RowSet {
        let mut set = RowSet::new(vec!["count()".to_string()]);
        set.rows.push(vec![CellValue::UInt(n)]);
        set
    }

    fn log_rows() -> RowSet {
        let mut set = RowSet::new(vec!["data_time".into(), "id".into(), "platform".into()]);
        set.rows.push(vec![
            CellValue::Bytes(b"2024-05-01 10:00:00".to_vec()),
            CellValue::Bytes(b"log_1".to_vec()),
            CellValue::Bytes(b"ios".to_vec()),
        ]);
        set.rows.push(vec![
            CellValue::Bytes(b"2024-05-01 09:00:00".to_vec()),
            CellValue::Bytes(b"log_2".to_vec()),
            CellValue::Bytes(b"web".to_vec()),
        ]);
        set
    }

    /// Answers COUNT statements with `count` and everything else with `rows`.
    fn store(rows: RowSet, count: u64) -> Arc<FakeAdapter> {
        Arc::new(FakeAdapter::new(move |statement: &SqlStatement| {
            if statement.sql.starts_with("SELECT COUNT(*)") {
                Ok(count_rows(count))
            } else {
                Ok(rows.clone())
            }
        }))
    }

    #[tokio::test]
    async fn test_kv7_count_is_filtered_count() {
        let fake = store(log_rows(), 42);
        let (service, _) = service_with(fake.clone(), false);
        let opts = QueryOptions::default().with_equality(EqualityField::Platform, "ios");

        let page = service.kv7(&opts, true).await.unwrap();
        assert!(!page.is_mock());
        assert_eq!(page.data.records.len(), 2);
        assert_eq!(page.data.total, Some(42));

        let executed = fake.executed();
        assert_eq!(executed.len(), 2);
        let count = executed.iter().find(|s| s.sql.starts_with("SELECT COUNT(*)")).unwrap();
        assert!(count.sql.contains("platform = ?"));
    }

    #[tokio::test]
    async fn test_gate_off_serves_mock_without_touching_store() {
        let fake = store(log_rows(), 42);
        let (service, supervisor) = service_with(fake.clone(), false);

        let mut opts = QueryOptions::default();
        opts.paginate(None, None);
        let page = service.logs(&opts, true).await.unwrap();
        assert!(page.is_mock());
        assert_eq!(page.data.records.len(), 20);
        assert_eq!(page.data.total, 20);
        assert_eq!(page.data.db_total, Some(800));
        assert!(fake.executed().is_empty());
        assert_eq!(supervisor.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_logs_live_counts() {
        let fake = store(log_rows(), 7);
        let (service, _) = service_with(fake.clone(), true);

        let page = service.logs(&QueryOptions::default(), true).await.unwrap();
        assert!(!page.is_mock());
        assert_eq!(page.data.total, 7);
        assert_eq!(page.data.db_total, Some(7));
        assert!(fake
            .executed()
            .iter()
            .any(|s| s.sql == "SELECT COUNT(*) FROM kv_7"));

        let without = service.logs(&QueryOptions::default(), false).await.unwrap();
        assert_eq!(without.data.db_total, None);
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_and_counts() {
        let fake = Arc::new(FakeAdapter::failing(AppError::Database));
        let (service, supervisor) = service_with(fake, true);

        let page = service.logs(&QueryOptions::default(), true).await.unwrap();
        assert!(page.is_mock());
        assert_eq!(page.data.records.len(), 25);
        assert_eq!(page.data.db_total, Some(1000));
        assert_eq!(supervisor.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back() {
        let fake = Arc::new(FakeAdapter::returning(log_rows()));
        fake.set_healthy(false);
        let (service, supervisor) = service_with(fake, true);

        let stats = service.network(&QueryOptions::default()).await.unwrap();
        assert!(stats.is_mock());
        assert_eq!(stats.data.time_series.len(), 24);
        assert_eq!(supervisor.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_cursor_error_is_not_masked() {
        let fake = Arc::new(FakeAdapter::failing(AppError::Cursor));
        let (service, supervisor) = service_with(fake, true);

        let err = service.recent(&QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Cursor(_)));
        assert_eq!(supervisor.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_record_not_found() {
        let fake = Arc::new(FakeAdapter::returning(RowSet::new(vec!["id".into()])));
        let (service, _) = service_with(fake, false);

        let err = service.record("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            service.record("  ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_record_mock_keeps_requested_id() {
        let fake = Arc::new(FakeAdapter::returning(RowSet::default()));
        fake.set_healthy(false);
        let (service, _) = service_with(fake, false);

        let record = service.record("log_123").await.unwrap();
        assert!(record.is_mock());
        assert_eq!(record.data.id(), "log_123");
    }

    #[tokio::test]
    async fn test_network_rows_map_unknown_buckets() {
        let hits = Arc::new(AtomicBool::new(false));
        let seen = hits.clone();
        let fake = Arc::new(FakeAdapter::new(move |statement: &SqlStatement| {
            seen.store(true, Ordering::SeqCst);
            let mut set;
            if statement.sql.starts_with("SELECT d38") {
                set = RowSet::new(vec!["network_type".into(), "count".into()]);
                set.rows.push(vec![CellValue::Bytes(Vec::new()), CellValue::UInt(3)]);
            } else if statement.sql.starts_with("SELECT toStartOfHour") {
                set = RowSet::new(vec!["hour".into(), "avg_total".into(), "count".into()]);
                set.rows.push(vec![
                    CellValue::Bytes(b"2024-05-01 10:00:00".to_vec()),
                    CellValue::Float(410.0),
                    CellValue::UInt(9),
                ]);
            } else {
                set = RowSet::default();
            }
            Ok(set)
        }));
        let (service, _) = service_with(fake, true);

        let stats = service.network(&QueryOptions::default()).await.unwrap();
        assert!(!stats.is_mock());
        assert!(hits.load(Ordering::SeqCst));
        assert_eq!(stats.data.network_types[0].network_type, "Unknown");
        assert_eq!(stats.data.time_series[0].hour, "2024-05-01 10:00");
        assert_eq!(stats.data.response_time, ResponseTimes::default());
    }

    #[tokio::test]
    async fn test_table_rows_validates_table_name() {
        let fake = Arc::new(FakeAdapter::returning(RowSet::default()));
        let (service, _) = service_with(fake, false);
        let err = service.table_rows("kv_7; DROP TABLE x", 10, 0).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
