use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::middleware::AppError;
use crate::config::ClickHouseConfig;
use crate::services::database::{ClickHouseAdapter, DatabaseAdapter};

/// Liveness probe before handing out an existing handle
pub const PROBE_TIMEOUT_SECS: u64 = 5;
/// Probe for a freshly built handle
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

type AdapterFactory = dyn Fn() -> Result<Arc<dyn DatabaseAdapter>, AppError> + Send + Sync;

/// Owns the process-wide store handle.
///
/// The handle moves through uninitialized -> live -> degraded -> live. Callers
/// only ever see it through [`ConnectionSupervisor::acquire`], which probes the
/// current handle and, when the probe fails, builds a replacement and swaps it
/// in wholesale under the write lock.
pub struct ConnectionSupervisor {
    current: RwLock<Option<Arc<dyn DatabaseAdapter>>>,
    factory: Arc<AdapterFactory>,
    endpoint: String,
    fallbacks: AtomicU64,
}

impl ConnectionSupervisor {
    /// Supervisor for the configured ClickHouse server. No connection is
    /// opened until the first `acquire`.
    pub fn new(settings: &ClickHouseConfig) -> Self {
        let endpoint = ClickHouseAdapter::connection_url(settings)
            .map(|url| Self::mask_credentials(url.as_str()))
            .unwrap_or_else(|_| "[invalid-url]".to_string());
        let settings = settings.clone();

        Self::with_factory(endpoint, move || {
            tracing::info!(
                host = %settings.host,
                port = settings.port,
                database = %settings.database,
                timeout_secs = CONNECT_TIMEOUT_SECS,
                "Connecting to ClickHouse"
            );
            let adapter: Arc<dyn DatabaseAdapter> = Arc::new(ClickHouseAdapter::new(&settings)?);
            Ok(adapter)
        })
    }

    pub fn with_factory<F>(endpoint: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn DatabaseAdapter>, AppError> + Send + Sync + 'static,
    {
        Self {
            current: RwLock::new(None),
            factory: Arc::new(factory),
            endpoint: endpoint.into(),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Masked connection URL, safe to log.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Return a live handle, reconnecting if the current one fails its probe.
    pub async fn acquire(&self) -> Result<Arc<dyn DatabaseAdapter>, AppError> {
        // Fast path: probe the current handle under the read lock
        let seen = self.current.read().await.clone();
        if let Some(adapter) = &seen {
            match adapter.test_connection(PROBE_TIMEOUT_SECS).await {
                Ok(()) => return Ok(adapter.clone()),
                Err(e) => tracing::warn!(endpoint = %self.endpoint, "Liveness probe failed: {}", e),
            }
        }

        // Slow path: rebuild under the write lock
        let mut slot = self.current.write().await;

        // Another task may have replaced the handle while we waited
        if let Some(existing) = slot.as_ref() {
            let replaced = seen
                .as_ref()
                .map_or(true, |stale| !Arc::ptr_eq(stale, existing));
            if replaced {
                return Ok(existing.clone());
            }
        }

        let rebuilt = match (self.factory)() {
            Ok(adapter) => adapter
                .test_connection(CONNECT_TIMEOUT_SECS)
                .await
                .map(|()| adapter),
            Err(e) => Err(e),
        };

        match rebuilt {
            Ok(adapter) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    database_type = adapter.database_type(),
                    "Store connection established"
                );
                *slot = Some(adapter.clone());
                Ok(adapter)
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, "Store connection failed: {}", e);
                *slot = None;
                Err(match e {
                    AppError::Unavailable(_) => e,
                    other => AppError::Unavailable(other.to_string()),
                })
            }
        }
    }

    /// Count a degrade to synthetic data.
    pub fn record_fallback(&self, endpoint: &str, reason: &str) {
        let total = self.fallbacks.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(endpoint, reason, total, "Serving mock data");
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Mask credentials in connection URL for safe logging
    pub fn mask_credentials(url: &str) -> String {
        if let Ok(parsed_url) = url::Url::parse(url) {
            let mut masked = parsed_url.clone();
            if parsed_url.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        } else {
            "[invalid-url]".to_string()
        }
    }
}
