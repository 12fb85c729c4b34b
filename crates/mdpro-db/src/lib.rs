//! # mdpro-db
//!
//! Storage layer for mdpro.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL implementations of the `mdpro-core` repository traits
//! - An in-memory store implementing the same traits, for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use mdpro_db::{CreateDocumentRequest, Database, DocumentRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/mdpro").await?;
//!     let doc = db.documents.insert(user_id, CreateDocumentRequest::default()).await?;
//!     println!("Created document: {}", doc.id);
//!     Ok(())
//! }
//! ```
pub mod accounts;
pub mod categories;
pub mod documents;
pub mod memory;
pub mod pool;
pub mod profiles;
pub mod shares;

// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use mdpro_core::*;

pub use accounts::PgAccountRepository;
pub use categories::PgCategoryRepository;
pub use documents::PgDocumentRepository;
pub use memory::MemoryStore;
pub use pool::{connect_pool, log_pool_metrics, PoolConfig};
pub use profiles::PgProfileRepository;
pub use shares::PgShareRepository;

use std::sync::Arc;

/// Map a unique-constraint violation to `Error::Conflict`, anything else to `Error::Database`.
pub(crate) fn map_unique(err: sqlx::Error, conflict: &str) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::Conflict(conflict.to_string())
        }
        _ => Error::Database(err),
    }
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub documents: PgDocumentRepository,
    pub categories: PgCategoryRepository,
    pub shares: PgShareRepository,
    pub profiles: PgProfileRepository,
    /// Accounts, sessions and recovery tokens.
    pub accounts: PgAccountRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            shares: PgShareRepository::new(pool.clone()),
            profiles: PgProfileRepository::new(pool.clone()),
            accounts: PgAccountRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = connect_pool(url, &PoolConfig::default()).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Repositories as trait objects, for the API layer.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            documents: Arc::new(self.documents.clone()),
            categories: Arc::new(self.categories.clone()),
            shares: Arc::new(self.shares.clone()),
            profiles: Arc::new(self.profiles.clone()),
            accounts: Arc::new(self.accounts.clone()),
        }
    }
}
