use std::future::Future;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::OnceCell;

/// LazyHandle
///
/// A memoized, first-use initialized handle. Every caller within one process
/// lifetime observes the same value; concurrent first callers wait on a single
/// initialization instead of racing to create duplicates. A failed
/// initialization is not cached, so the next caller tries again.
#[derive(Debug)]
pub struct LazyHandle<T> {
    cell: OnceCell<T>,
}

impl<T> Default for LazyHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyHandle<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The handle, if it has been initialized already.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// get_or_try_init
    ///
    /// Returns the existing handle, or runs `init` to create it. `init` runs at
    /// most once successfully per handle.
    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(init).await
    }
}

/// StoreHandle
///
/// The process-wide database handle. The connection pool is created on first
/// use, not at construction, so the server can bind before the database answers.
#[derive(Debug)]
pub struct StoreHandle {
    db_url: String,
    max_connections: u32,
    pool: LazyHandle<PgPool>,
}

impl StoreHandle {
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            max_connections: 5,
            pool: LazyHandle::new(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// pool
    ///
    /// The shared connection pool, connecting on the first call.
    pub async fn pool(&self) -> Result<&PgPool, sqlx::Error> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!(
                    max_connections = self.max_connections,
                    "Connecting to database"
                );
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect(&self.db_url)
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "Database connection failed"))
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_initialized()
    }
}
