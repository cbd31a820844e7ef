//! Tax and totals calculations for practice documents.
//!
//! The entry point is [`TotalsCalculator`], a pure function of the detail
//! rows and the active fiscal surcharges. VAT codes are resolved to
//! percentages by [`aliquota_iva`].

pub mod common;
pub mod iva;
pub mod totali;

pub use iva::aliquota_iva;
pub use totali::{BolloCarico, InvoiceTotals, SurchargeConfig, TotalsCalculator, TotalsError};
