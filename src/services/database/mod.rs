// Store access: the adapter seam and its ClickHouse implementation
pub mod adapter;
pub mod clickhouse;
#[cfg(test)]
pub mod fake;

pub use adapter::DatabaseAdapter;
pub use clickhouse::ClickHouseAdapter;
