use async_trait::async_trait;

use fattura_core::db::repository::{InvoiceRepository, RepositoryError};
use fattura_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`fattura_core::db::RepositoryRegistry`] to make
/// the `"sqlite"` backend available:
///
/// ```rust,no_run
/// use fattura_core::db::RepositoryRegistry;
/// use fattura_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and run
    /// the embedded migrations.
    ///
    /// Accepted connection-string values:
    /// * A bare file path — e.g. `"fatture.db"`.  The file is created if
    ///   it does not exist.
    /// * `":memory:"` — an ephemeral in-memory database (useful for
    ///   tests).
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn InvoiceRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(Box::new(repo))
    }
}
