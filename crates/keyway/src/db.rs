use std::sync::Arc;

use keyway_core::storage::Backend;

use crate::config::Config;
use crate::engine::RateLimiter;
use crate::entity::Entity;
use crate::table::{BatchPolicy, Table};

/// Entry point: one backend, one configuration, a typed table per entity.
#[derive(Clone)]
pub struct Db {
    backend: Arc<dyn Backend>,
    config: Config,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl Db {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        Self {
            backend,
            config,
            limiter: None,
        }
    }

    /// Connects to DynamoDB using `AWS_ENDPOINT_URL` / `AWS_REGION`.
    #[cfg(feature = "dynamodb")]
    pub async fn connect(config: Config, aws: &crate::config::AwsConfig) -> Self {
        let backend = crate::storage::DynamoDbBackend::connect(aws).await;
        tracing::info!(target_env = %aws.target_display(), prefix = %config.table_prefix, "Connected");
        Self::new(Arc::new(backend), config)
    }

    /// Pace item dispatch for every table handed out from now on.
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    pub fn table<E: Entity>(&self) -> Table<E> {
        let policy = BatchPolicy {
            max_attempts: self.config.batch_max_attempts,
            initial_backoff: self.config.batch_backoff(),
            ..BatchPolicy::default()
        };
        let table = Table::new(self.backend.clone(), &self.config.table_prefix)
            .with_page_size(self.config.page_size)
            .with_batch_policy(policy);

        match &self.limiter {
            Some(limiter) => table.with_limiter(limiter.clone()),
            None => table,
        }
    }
}
