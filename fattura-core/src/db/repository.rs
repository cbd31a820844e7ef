use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    Invoice, InvoiceLine, NewInvoice, NewInvoiceLine, NewPackage, Package, SdiStatus,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Paid documents cannot be deleted")]
    InvoicePaid,

    #[error("Package has no remaining sessions")]
    PackageExhausted,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Persistence seam for documents and packages.
///
/// Implementations own the two write paths callers rely on being atomic:
/// number assignment happens inside the insert transaction, and updating a
/// document replaces the header and all detail rows in a single
/// transaction.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    // Documents
    /// Assigns the next `YYYY/NNN` number for the document's year and
    /// inserts header plus detail rows in one transaction.
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<Invoice, RepositoryError>;

    async fn get_invoice(&self, id: i64) -> Result<Invoice, RepositoryError>;

    async fn list_invoices(&self, anno: Option<i32>) -> Result<Vec<Invoice>, RepositoryError>;

    async fn get_invoice_lines(&self, fattura_id: i64)
    -> Result<Vec<InvoiceLine>, RepositoryError>;

    /// Updates the header and replaces all detail rows in one transaction.
    async fn update_invoice(
        &self,
        invoice: &Invoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<(), RepositoryError>;

    /// Refuses with [`RepositoryError::InvoicePaid`] for paid documents.
    async fn delete_invoice(&self, id: i64) -> Result<(), RepositoryError>;

    async fn mark_paid(
        &self,
        id: i64,
        data_pagamento: NaiveDate,
    ) -> Result<(), RepositoryError>;

    async fn set_sdi_status(&self, id: i64, stato: SdiStatus) -> Result<(), RepositoryError>;

    /// Persists a conversion built by the workflow: inserts the new
    /// document under an `FT N/YYYY` number, copies its detail rows, and
    /// sets `convertita_in_id` on the original — all in one transaction.
    async fn convert_invoice(
        &self,
        original_id: i64,
        converted: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<Invoice, RepositoryError>;

    // Packages
    async fn create_package(&self, package: NewPackage) -> Result<Package, RepositoryError>;

    /// Creates the package and its auto-generated invoice together.
    async fn create_package_with_invoice(
        &self,
        package: NewPackage,
        invoice: NewInvoice,
        lines: Vec<NewInvoiceLine>,
    ) -> Result<(Package, Invoice), RepositoryError>;

    async fn get_package(&self, id: i64) -> Result<Package, RepositoryError>;

    async fn list_packages(&self, paziente_id: i64) -> Result<Vec<Package>, RepositoryError>;

    /// Increments the usage counter; refuses when the package is
    /// exhausted.
    async fn consume_session(&self, id: i64) -> Result<Package, RepositoryError>;
}
