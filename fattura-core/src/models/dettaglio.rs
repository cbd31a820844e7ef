use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One detail row of a document.
///
/// The VAT percentage is never stored here: it is derived from
/// `codice_iva` by [`crate::calculations::aliquota_iva`] at calculation
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: i64,
    pub fattura_id: i64,
    pub descrizione: String,
    pub servizio_id: Option<i64>,
    pub quantita: Decimal,
    pub prezzo_unitario: Decimal,
    /// Percentage discount, 0–100.
    pub sconto_pct: Decimal,
    pub codice_iva: String,
}

/// For creating detail rows (no id or parent reference yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceLine {
    pub descrizione: String,
    pub servizio_id: Option<i64>,
    pub quantita: Decimal,
    pub prezzo_unitario: Decimal,
    pub sconto_pct: Decimal,
    pub codice_iva: String,
}

impl NewInvoiceLine {
    /// Taxable amount of this line: `quantita * prezzo_unitario *
    /// (1 - sconto_pct/100)`.
    pub fn imponibile(&self) -> Decimal {
        let sconto = Decimal::ONE - self.sconto_pct / Decimal::ONE_HUNDRED;
        self.quantita * self.prezzo_unitario * sconto
    }
}

impl InvoiceLine {
    /// See [`NewInvoiceLine::imponibile`].
    pub fn imponibile(&self) -> Decimal {
        let sconto = Decimal::ONE - self.sconto_pct / Decimal::ONE_HUNDRED;
        self.quantita * self.prezzo_unitario * sconto
    }

    /// Detached copy used when converting a document or issuing a credit
    /// note: line items are carried over verbatim.
    pub fn to_new(&self) -> NewInvoiceLine {
        NewInvoiceLine {
            descrizione: self.descrizione.clone(),
            servizio_id: self.servizio_id,
            quantita: self.quantita,
            prezzo_unitario: self.prezzo_unitario,
            sconto_pct: self.sconto_pct,
            codice_iva: self.codice_iva.clone(),
        }
    }
}
