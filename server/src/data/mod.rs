//! Data storage layer
//!
//! - `sqlite` - project store (users, projects, tasks, budgets, ...)
//! - `files` - content-addressed attachment storage
//! - `cache` - in-memory cache and rate-limit counters
//! - `types` - row types shared by repositories and handlers
//! - `traits` - `TransactionalRepository`, the seam handlers talk to
//! - `error` - unified data-layer error

pub mod cache;
pub mod error;
pub mod files;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use sqlite::SqliteService;
pub use traits::TransactionalRepository;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::storage::AppStorage;

/// Transactional database service
///
/// Owns the SQLite service and hands out repository trait objects.
pub struct TransactionalService {
    sqlite: Arc<SqliteService>,
}

impl TransactionalService {
    /// Open (or create) the project store and run pending migrations
    pub async fn init(storage: &AppStorage) -> Result<Self, DataError> {
        let service = SqliteService::init(storage).await?;
        Ok(Self {
            sqlite: Arc::new(service),
        })
    }

    /// Wrap an existing pool (in-memory test databases)
    #[cfg(test)]
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        Self {
            sqlite: Arc::new(SqliteService::from_pool(pool)),
        }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.sqlite.pool()
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        self.sqlite.ping().await.map_err(Into::into)
    }

    /// Run a WAL checkpoint
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        self.sqlite.checkpoint().await.map_err(Into::into)
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        self.sqlite.close().await
    }

    pub fn start_checkpoint_task(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        self.sqlite.start_checkpoint_task(shutdown_rx)
    }

    /// Get the repository trait object for data operations
    pub fn repository(&self) -> Box<dyn TransactionalRepository + Send + Sync> {
        Box::new(Arc::clone(&self.sqlite))
    }
}
