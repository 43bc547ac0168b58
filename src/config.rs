use serde::Deserialize;
use std::env;

use crate::validation::SqlValidator;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub clickhouse: ClickHouseConfig,
    pub query: QueryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub table: String,
    pub max_open: usize,
    pub max_idle: usize,
    pub conn_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// When false the log/listing/analytics endpoints serve generated data.
    pub use_real_database: bool,
    pub default_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Environment variable -> config key overrides.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("CLICKHOUSE_HOST", "clickhouse.host"),
    ("CLICKHOUSE_PORT", "clickhouse.port"),
    ("CLICKHOUSE_DATABASE", "clickhouse.database"),
    ("CLICKHOUSE_USER", "clickhouse.username"),
    ("CLICKHOUSE_PASSWORD", "clickhouse.password"),
    ("CLICKHOUSE_TABLE", "clickhouse.table"),
    ("CLICKHOUSE_MAX_OPEN", "clickhouse.max_open"),
    ("CLICKHOUSE_MAX_IDLE", "clickhouse.max_idle"),
    ("CLICKHOUSE_CONN_LIFETIME_SECS", "clickhouse.conn_lifetime_secs"),
    ("DEFAULT_LIMIT", "query.default_limit"),
    ("HOST", "server.host"),
    ("BACKEND_PORT", "server.port"),
    ("RUST_LOG", "logging.level"),
];

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("clickhouse.host", "127.0.0.1")?
            .set_default("clickhouse.port", 9004)?
            .set_default("clickhouse.database", "default")?
            .set_default("clickhouse.username", "default")?
            .set_default("clickhouse.password", "")?
            .set_default("clickhouse.table", "kv_7")?
            .set_default("clickhouse.max_open", 10)?
            .set_default("clickhouse.max_idle", 5)?
            .set_default("clickhouse.conn_lifetime_secs", 3600)?
            .set_default("query.use_real_database", false)?
            .set_default("query.default_limit", 50)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8888)?
            .set_default("logging.level", "info")?;

        // Load from environment variables; empty values keep the default
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = env::var(var) {
                if !value.trim().is_empty() {
                    builder = builder.set_override(*key, value)?;
                }
            }
        }

        if let Ok(flag) = env::var("USE_REAL_DATABASE") {
            builder = builder.set_override("query.use_real_database", flag.trim() == "true")?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        SqlValidator::validate_identifier(&self.clickhouse.table)
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        if self.query.default_limit == 0 {
            return Err(config::ConfigError::Message(
                "DEFAULT_LIMIT must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without consulting the environment.
    pub fn for_tests(use_real_database: bool) -> Self {
        Self {
            clickhouse: ClickHouseConfig {
                host: "127.0.0.1".to_string(),
                port: 9004,
                database: "default".to_string(),
                username: "default".to_string(),
                password: String::new(),
                table: "kv_7".to_string(),
                max_open: 10,
                max_idle: 5,
                conn_lifetime_secs: 3600,
            },
            query: QueryConfig {
                use_real_database,
                default_limit: 50,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        for (var, _) in ENV_OVERRIDES {
            if *var != "RUST_LOG" {
                env::remove_var(var);
            }
        }
        env::remove_var("USE_REAL_DATABASE");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.clickhouse.port, 9004);
        assert_eq!(config.clickhouse.table, "kv_7");
        assert_eq!(config.clickhouse.max_open, 10);
        assert_eq!(config.query.default_limit, 50);
        assert!(!config.query.use_real_database);
        assert_eq!(config.server_address(), "0.0.0.0:8888");
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut config = Config::for_tests(false);
        config.clickhouse.table = "kv_7; DROP TABLE kv_7".to_string();
        assert!(config.validate().is_err());
    }
}
