//! dynaql configuration.

use std::env;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct DynaQlConfig {
    /// Convert list and map columns into `serde_json::Value` (default: false).
    pub convert_collections: bool,
    /// Upper bound on waiting for a table schema (default: unbounded).
    pub describe_timeout: Option<Duration>,
    /// Upper bound on each `Query` page fetch (default: unbounded).
    pub page_timeout: Option<Duration>,
}

impl DynaQlConfig {
    /// Create configuration from environment variables.
    ///
    /// - `DYNAQL_CONVERT_COLLECTIONS`: `1`, `true` or `yes` enables deep conversion.
    /// - `DYNAQL_DESCRIBE_TIMEOUT_MS`: schema wait bound in milliseconds.
    /// - `DYNAQL_PAGE_TIMEOUT_MS`: page fetch bound in milliseconds.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            convert_collections: env_bool("DYNAQL_CONVERT_COLLECTIONS", false),
            describe_timeout: env_millis("DYNAQL_DESCRIBE_TIMEOUT_MS"),
            page_timeout: env_millis("DYNAQL_PAGE_TIMEOUT_MS"),
        }
    }

    /// Enable or disable deep conversion of collections.
    #[must_use]
    pub fn with_convert_collections(mut self, enabled: bool) -> Self {
        self.convert_collections = enabled;
        self
    }

    /// Bound the wait for table schemas.
    #[must_use]
    pub fn with_describe_timeout(mut self, timeout: Duration) -> Self {
        self.describe_timeout = Some(timeout);
        self
    }

    /// Bound each page fetch.
    #[must_use]
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = Some(timeout);
        self
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
