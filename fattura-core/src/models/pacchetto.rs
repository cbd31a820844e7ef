use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A prepaid bundle of sessions for one patient/service pair.
///
/// Consumption happens when appointments reference the package; the
/// repository only exposes the counter increment
/// ([`crate::db::InvoiceRepository::consume_session`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub paziente_id: i64,
    pub servizio_id: i64,
    pub quantita_totale: i32,
    pub quantita_utilizzata: i32,
    pub prezzo_totale: Decimal,
    pub prezzo_per_seduta: Decimal,
    /// Set when the package was sold together with an auto-generated
    /// invoice.
    pub fattura_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn quantita_rimanente(&self) -> i32 {
        self.quantita_totale - self.quantita_utilizzata
    }

    pub fn is_exhausted(&self) -> bool {
        self.quantita_rimanente() <= 0
    }
}

/// For creating new packages (no id, usage counter, or timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPackage {
    pub paziente_id: i64,
    pub servizio_id: i64,
    pub quantita_totale: i32,
    pub prezzo_totale: Decimal,
    pub prezzo_per_seduta: Decimal,
}
