pub mod calculations;
pub mod db;
pub mod draft;
pub mod models;
pub mod workflow;

pub use db::repository::{InvoiceRepository, RepositoryError};
pub use models::*;
