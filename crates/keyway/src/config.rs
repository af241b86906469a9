use std::{env, time::Duration};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix applied to every table name (default: none)
    pub table_prefix: String,
    /// Maximum items requested per backend page (default: backend decides)
    pub page_size: Option<usize>,
    /// Attempts per batch chunk before unprocessed items become an error (default: 8)
    pub batch_max_attempts: u32,
    /// First backoff between batch attempts in milliseconds, doubled per attempt (default: 50)
    pub batch_backoff_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KEYWAY_TABLE_PREFIX` - Table name prefix, e.g. `dev` for `dev-users` (default: "")
    /// - `KEYWAY_PAGE_SIZE` - Items per backend page (default: unset)
    /// - `KEYWAY_BATCH_MAX_ATTEMPTS` - Batch write attempts (default: 8)
    /// - `KEYWAY_BATCH_BACKOFF_MS` - Initial batch retry backoff (default: 50)
    pub fn from_env() -> Self {
        Self {
            table_prefix: env::var("KEYWAY_TABLE_PREFIX").unwrap_or_default(),
            page_size: env::var("KEYWAY_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0),
            batch_max_attempts: env::var("KEYWAY_BATCH_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|attempts| *attempts > 0)
                .unwrap_or(8),
            batch_backoff_ms: env::var("KEYWAY_BATCH_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }

    /// Get the initial batch backoff as a Duration.
    pub fn batch_backoff(&self) -> Duration {
        Duration::from_millis(self.batch_backoff_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// AWS client configuration for the DynamoDB backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Custom endpoint URL (for local DynamoDB).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
}

impl AwsConfig {
    /// Load from `AWS_ENDPOINT_URL` and `AWS_REGION` (default: "us-east-1").
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        }
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
