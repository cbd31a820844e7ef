//! SQLite backend for the practice's document store.
//!
//! [`SqliteRepository`] implements
//! [`fattura_core::db::InvoiceRepository`] on top of `sqlx` with embedded
//! migrations. The write paths the dialog depends on are transactional
//! here: number assignment happens inside the insert transaction, and
//! editing a document replaces its detail rows under the same transaction
//! as the header update.

pub mod decimal;
pub mod factory;
pub mod repository;

pub use factory::SqliteRepositoryFactory;
pub use repository::SqliteRepository;
