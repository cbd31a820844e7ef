use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Document kinds handled by the practice, from non-binding drafts
/// (preventivo, pro-forma) to legally final invoices and credit notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    FatturaSanitaria,
    FatturaElettronicaPg,
    FatturaElettronicaPa,
    FatturaProforma,
    Preventivo,
    NotaCredito,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FatturaSanitaria => "fattura_sanitaria",
            Self::FatturaElettronicaPg => "fattura_elettronica_pg",
            Self::FatturaElettronicaPa => "fattura_elettronica_pa",
            Self::FatturaProforma => "fattura_proforma",
            Self::Preventivo => "preventivo",
            Self::NotaCredito => "nota_credito",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fattura_sanitaria" => Some(Self::FatturaSanitaria),
            "fattura_elettronica_pg" => Some(Self::FatturaElettronicaPg),
            "fattura_elettronica_pa" => Some(Self::FatturaElettronicaPa),
            "fattura_proforma" => Some(Self::FatturaProforma),
            "preventivo" => Some(Self::Preventivo),
            "nota_credito" => Some(Self::NotaCredito),
            _ => None,
        }
    }

    /// A legally final invoice, as opposed to a draft document or a
    /// credit note.
    pub fn is_final_invoice(&self) -> bool {
        matches!(
            self,
            Self::FatturaSanitaria | Self::FatturaElettronicaPg | Self::FatturaElettronicaPa
        )
    }

    /// Draft documents that can be accepted and converted into an invoice.
    pub fn is_convertible_draft(&self) -> bool {
        matches!(self, Self::Preventivo | Self::FatturaProforma)
    }
}

/// Lifecycle status of the document itself (distinct from the SDI
/// transmission status, which only electronic invoices carry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    DaInviare,
    Inviata,
    Pagata,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DaInviare => "Da Inviare",
            Self::Inviata => "Inviata",
            Self::Pagata => "Pagata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Da Inviare" => Some(Self::DaInviare),
            "Inviata" => Some(Self::Inviata),
            "Pagata" => Some(Self::Pagata),
            _ => None,
        }
    }
}

/// Status reported back by the Sistema di Interscambio exchange gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdiStatus {
    DaInviare,
    Inviata,
    Consegnata,
    Scartata,
}

impl SdiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DaInviare => "da_inviare",
            Self::Inviata => "inviata",
            Self::Consegnata => "consegnata",
            Self::Scartata => "scartata",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "da_inviare" => Some(Self::DaInviare),
            "inviata" => Some(Self::Inviata),
            "consegnata" => Some(Self::Consegnata),
            "scartata" => Some(Self::Scartata),
            _ => None,
        }
    }
}

/// A persisted document: header row plus N detail rows (see
/// [`crate::models::InvoiceLine`]).
///
/// Invariant maintained by the calculator and enforced in tests:
/// `totale = imponibile + iva_importo + cassa_previdenziale +
/// contributo_integrativo + bollo_virtuale - ritenuta_acconto`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    /// Sequential number, `YYYY/NNN` (or `FT N/YYYY` for documents created
    /// by converting a quote/pro-forma).
    pub numero: String,
    pub data: NaiveDate,
    pub paziente_id: i64,
    pub tipo_documento: DocumentType,
    pub metodo_pagamento: Option<String>,
    pub stato: InvoiceStatus,
    pub pagata: bool,
    pub data_pagamento: Option<NaiveDate>,

    // Computed totals
    pub imponibile: Decimal,
    pub iva_importo: Decimal,
    pub cassa_previdenziale: Decimal,
    pub ritenuta_acconto: Decimal,
    pub contributo_integrativo: Decimal,
    pub bollo_virtuale: Decimal,
    pub totale: Decimal,

    // Credit-note link to the invoice being reversed
    pub fattura_originale_id: Option<i64>,
    pub fattura_originale_numero: Option<String>,
    pub fattura_originale_data: Option<NaiveDate>,

    // Quote/pro-forma <-> invoice conversion links
    pub convertita_da_id: Option<i64>,
    pub convertita_in_id: Option<i64>,

    // External gateway flags (written by the e-invoicing/TS collaborators)
    pub sdi_stato: Option<SdiStatus>,
    pub ts_inviata: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For creating new documents (no id, number, or timestamps — the
/// repository assigns the sequential number inside the insert transaction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub data: NaiveDate,
    pub paziente_id: i64,
    pub tipo_documento: DocumentType,
    pub metodo_pagamento: Option<String>,

    pub imponibile: Decimal,
    pub iva_importo: Decimal,
    pub cassa_previdenziale: Decimal,
    pub ritenuta_acconto: Decimal,
    pub contributo_integrativo: Decimal,
    pub bollo_virtuale: Decimal,
    pub totale: Decimal,

    pub fattura_originale_id: Option<i64>,
    pub fattura_originale_numero: Option<String>,
    pub fattura_originale_data: Option<NaiveDate>,
    pub convertita_da_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn document_type_round_trips_wire_strings() {
        for tipo in [
            DocumentType::FatturaSanitaria,
            DocumentType::FatturaElettronicaPg,
            DocumentType::FatturaElettronicaPa,
            DocumentType::FatturaProforma,
            DocumentType::Preventivo,
            DocumentType::NotaCredito,
        ] {
            assert_eq!(DocumentType::parse(tipo.as_str()), Some(tipo));
        }
    }

    #[test]
    fn document_type_rejects_unknown_string() {
        assert_eq!(DocumentType::parse("fattura"), None);
    }

    #[test]
    fn final_invoice_classification() {
        assert!(DocumentType::FatturaSanitaria.is_final_invoice());
        assert!(DocumentType::FatturaElettronicaPa.is_final_invoice());
        assert!(!DocumentType::Preventivo.is_final_invoice());
        assert!(!DocumentType::NotaCredito.is_final_invoice());
    }

    #[test]
    fn convertible_draft_classification() {
        assert!(DocumentType::Preventivo.is_convertible_draft());
        assert!(DocumentType::FatturaProforma.is_convertible_draft());
        assert!(!DocumentType::FatturaSanitaria.is_convertible_draft());
    }

    #[test]
    fn invoice_status_round_trips() {
        for stato in [
            InvoiceStatus::DaInviare,
            InvoiceStatus::Inviata,
            InvoiceStatus::Pagata,
        ] {
            assert_eq!(InvoiceStatus::parse(stato.as_str()), Some(stato));
        }
    }

    #[test]
    fn sdi_status_round_trips() {
        for stato in [
            SdiStatus::DaInviare,
            SdiStatus::Inviata,
            SdiStatus::Consegnata,
            SdiStatus::Scartata,
        ] {
            assert_eq!(SdiStatus::parse(stato.as_str()), Some(stato));
        }
    }
}
