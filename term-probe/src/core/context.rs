//! DataFusion session management.
//!
//! [`TermContext`] wraps a [`SessionContext`] tuned for interrogation
//! workloads and hands out registered tables as either family.

use arrow::array::RecordBatch;
use datafusion::datasource::{MemTable, TableProvider};
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::CsvReadOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ErrorContext, Result, TermError};
use crate::table::{DeferredTable, EagerTable, TableBackend};

/// Configuration for creating a [`TermContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermContextConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Memory pool limit in bytes
    pub max_memory: usize,
}

impl Default for TermContextConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}

/// A managed DataFusion session that tracks the tables it registers.
///
/// # Examples
///
/// ```rust,no_run
/// use term_probe::core::TermContext;
///
/// # async fn example() -> term_probe::error::Result<()> {
/// let mut ctx = TermContext::new()?;
/// ctx.register_csv("orders", "data/orders.csv").await?;
/// let orders = ctx.deferred_table("orders").await?;
/// # Ok(())
/// # }
/// ```
pub struct TermContext {
    inner: SessionContext,
    tables: HashMap<String, Arc<dyn TableProvider>>,
    config: TermContextConfig,
}

impl TermContext {
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(TermContextConfig::default())
    }

    #[instrument(skip(config))]
    pub fn with_config(config: TermContextConfig) -> Result<Self> {
        if config.batch_size == 0 || config.target_partitions == 0 {
            return Err(TermError::Configuration(
                "batch_size and target_partitions must be positive".to_string(),
            ));
        }

        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        let memory_pool = Arc::new(FairSpillPool::new(config.max_memory)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        let inner = SessionContext::new_with_config_rt(session_config, runtime_env);

        Ok(Self {
            inner,
            tables: HashMap::new(),
            config,
        })
    }

    pub fn inner(&self) -> &SessionContext {
        &self.inner
    }

    pub fn config(&self) -> &TermContextConfig {
        &self.config
    }

    /// Names of all registered tables, sorted.
    pub fn registered_tables(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tables.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    #[instrument(skip(self))]
    pub async fn register_csv(&mut self, name: &str, path: &str) -> Result<()> {
        self.inner
            .register_csv(name, path, CsvReadOptions::new())
            .await
            .with_context(|| format!("failed to register '{path}' as '{name}'"))?;
        let provider = self.inner.table_provider(name).await?;
        self.tables.insert(name.to_string(), provider);
        debug!(table = name, path, "Registered CSV table");
        Ok(())
    }

    /// Registers an in-memory batch under `name`.
    #[instrument(skip(self, batch), fields(rows = batch.num_rows()))]
    pub fn register_batch(&mut self, name: &str, batch: RecordBatch) -> Result<()> {
        let provider = Arc::new(MemTable::try_new(batch.schema(), vec![vec![batch]])?);
        self.register_table_provider(name, provider)
    }

    pub fn register_table_provider(
        &mut self,
        name: &str,
        provider: Arc<dyn TableProvider>,
    ) -> Result<()> {
        self.inner.register_table(name, provider.clone())?;
        self.tables.insert(name.to_string(), provider);
        Ok(())
    }

    fn ensure_registered(&self, name: &str) -> Result<()> {
        if self.has_table(name) {
            Ok(())
        } else {
            Err(TermError::Configuration(format!(
                "table '{name}' is not registered"
            )))
        }
    }

    /// A lazy scan of a registered table.
    pub async fn deferred_table(&self, name: &str) -> Result<DeferredTable> {
        self.ensure_registered(name)?;
        Ok(DeferredTable::new(self.inner.table(name).await?))
    }

    /// A registered table, realized in memory.
    pub async fn eager_table(&self, name: &str) -> Result<EagerTable> {
        self.deferred_table(name).await?.collect().await
    }

    pub fn deregister_table(&mut self, name: &str) -> Result<()> {
        self.inner.deregister_table(name)?;
        self.tables.remove(name);
        Ok(())
    }

    pub fn clear_tables(&mut self) -> Result<()> {
        let names: Vec<_> = self.tables.keys().cloned().collect();
        for name in names {
            self.deregister_table(&name)?;
        }
        Ok(())
    }
}

impl Drop for TermContext {
    fn drop(&mut self) {
        if let Err(e) = self.clear_tables() {
            tracing::warn!("Failed to clear tables during TermContext drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::nullable_pair_batch;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TermContextConfig::default();
        assert_eq!(config.batch_size, 8192);
        assert_eq!(config.max_memory, 2 * 1024 * 1024 * 1024);
        assert!(config.target_partitions > 0);

        let parsed: TermContextConfig = serde_json::from_str(r#"{"batch_size": 1024}"#).unwrap();
        assert_eq!(parsed.batch_size, 1024);
        assert_eq!(parsed.max_memory, config.max_memory);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let config = TermContextConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            TermContext::with_config(config),
            Err(TermError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_registration_both_families() {
        let mut ctx = TermContext::new().unwrap();
        ctx.register_batch("pairs", nullable_pair_batch()).unwrap();
        assert!(ctx.has_table("pairs"));
        assert_eq!(ctx.registered_tables(), vec!["pairs"]);

        let deferred = ctx.deferred_table("pairs").await.unwrap();
        assert_eq!(deferred.count_rows().await.unwrap(), 4);
        let eager = ctx.eager_table("pairs").await.unwrap();
        assert_eq!(eager.num_rows(), 4);
        assert_eq!(eager.null_count("b").await.unwrap(), 2);

        ctx.deregister_table("pairs").unwrap();
        assert!(!ctx.has_table("pairs"));
        assert!(matches!(
            ctx.deferred_table("pairs").await,
            Err(TermError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_csv_registration() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,amount").unwrap();
        writeln!(file, "1,10").unwrap();
        writeln!(file, "2,-5").unwrap();
        writeln!(file, "3,7").unwrap();
        file.flush().unwrap();

        let mut ctx = TermContext::new().unwrap();
        ctx.register_csv("orders", file.path().to_str().unwrap())
            .await
            .unwrap();
        let orders = ctx.deferred_table("orders").await.unwrap();
        assert_eq!(orders.count_rows().await.unwrap(), 3);
        assert!(orders.has_column("amount"));

        ctx.clear_tables().unwrap();
        assert!(ctx.registered_tables().is_empty());
    }
}
