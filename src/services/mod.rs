pub mod analytics_service;
pub mod connection_pool;
pub mod csv_export;
pub mod database; // Store adapter seam and ClickHouse driver
pub mod materializer;
pub mod mock_data;
pub mod sql_builder;
pub mod sql_gateway;

pub use analytics_service::{AnalyticsService, Degrade, LogPage, RecordPage};
pub use connection_pool::ConnectionSupervisor;
pub use sql_builder::{SqlBuilder, SqlParam, SqlStatement};
pub use sql_gateway::{GatewayResult, SqlGateway};
