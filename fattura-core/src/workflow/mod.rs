//! Document workflow: numbering, lifecycle transitions and edit guards.

pub mod numerazione;
pub mod transizioni;

pub use numerazione::{
    ConversionNumber, DocumentNumber, NumberError, next_conversion_in_year, next_in_year,
};
pub use transizioni::{
    EditWarning, WorkflowError, allowed_document_types, build_conversion, build_credit_note,
    can_convert, can_credit, can_delete, conversion_target, edit_warnings,
    electronic_invoice_type,
};
