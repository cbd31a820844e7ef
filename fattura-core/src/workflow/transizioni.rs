//! Document lifecycle transitions.
//!
//! Governs which document types may be offered for a patient, when a quote
//! or pro-forma can be converted into a final invoice, when a credit note
//! can be issued, and which conditions should warn the user before an edit.
//!
//! The edit guard is deliberately *soft*: the conditions reported by
//! [`edit_warnings`] require a confirmation, not a refusal. Deletion of a
//! paid document, by contrast, is refused outright.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    DocumentType, Invoice, InvoiceLine, InvoiceStatus, NewInvoice, NewInvoiceLine, PatientKind,
    SdiStatus,
};

/// Errors raised by illegal lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// Only quotes and pro-formas can be converted into an invoice.
    #[error("document of type '{}' cannot be converted", .0.as_str())]
    NotConvertible(DocumentType),

    /// A quote/pro-forma must be accepted (marked paid) before conversion.
    #[error("document must be accepted before conversion")]
    NotAccepted,

    /// The document was already converted into an invoice.
    #[error("document was already converted (invoice id {0})")]
    AlreadyConverted(i64),

    /// Credit notes can only reverse final electronic invoices.
    #[error("document of type '{}' cannot receive a credit note", .0.as_str())]
    NotCreditable(DocumentType),

    /// Paid documents are never hard-deleted.
    #[error("paid documents cannot be deleted")]
    PaidDocument,
}

/// Conditions that should prompt a confirmation before editing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditWarning {
    /// The document is marked paid.
    Paid,
    /// The document status says it was transmitted.
    Transmitted,
    /// The SDI gateway holds it in a state other than "to send".
    SdiInProgress,
    /// An accepted quote/pro-forma is being reopened.
    AcceptedDraft,
    /// The pro-forma was already converted into an invoice.
    ConvertedProforma,
}

impl EditWarning {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Paid => "il documento risulta già pagato",
            Self::Transmitted => "il documento risulta già inviato",
            Self::SdiInProgress => "il documento è già stato trasmesso allo SDI",
            Self::AcceptedDraft => "il preventivo/proforma è già stato accettato",
            Self::ConvertedProforma => "la proforma è già stata convertita in fattura",
        }
    }
}

/// Document types that may be issued to the given patient.
///
/// Natural persons receive sanitary invoices and quotes only; legal
/// entities get the electronic-invoice variants, pro-formas, credit notes
/// and quotes.
pub fn allowed_document_types(paziente: &PatientKind) -> &'static [DocumentType] {
    match paziente {
        PatientKind::PersonaFisica => {
            &[DocumentType::FatturaSanitaria, DocumentType::Preventivo]
        }
        PatientKind::PersonaGiuridica { .. } => &[
            DocumentType::FatturaElettronicaPg,
            DocumentType::FatturaElettronicaPa,
            DocumentType::FatturaProforma,
            DocumentType::NotaCredito,
            DocumentType::Preventivo,
        ],
    }
}

/// Electronic-invoice variant for a legal entity, driven by the length of
/// its codice destinatario: 6 characters means public administration, 7
/// means a private company, anything else falls back to a pro-forma.
pub fn electronic_invoice_type(codice_destinatario: &str) -> DocumentType {
    match codice_destinatario.trim().len() {
        6 => DocumentType::FatturaElettronicaPa,
        7 => DocumentType::FatturaElettronicaPg,
        _ => DocumentType::FatturaProforma,
    }
}

/// Final invoice type an accepted quote/pro-forma converts into.
pub fn conversion_target(paziente: &PatientKind) -> DocumentType {
    match paziente {
        PatientKind::PersonaFisica => DocumentType::FatturaSanitaria,
        PatientKind::PersonaGiuridica { codice_destinatario } => {
            electronic_invoice_type(codice_destinatario)
        }
    }
}

/// Conditions that should be confirmed by the user before editing.
/// An empty vec means the edit can proceed silently.
pub fn edit_warnings(invoice: &Invoice) -> Vec<EditWarning> {
    let mut warnings = Vec::new();

    if invoice.pagata && !invoice.tipo_documento.is_convertible_draft() {
        warnings.push(EditWarning::Paid);
    }
    if invoice.stato == InvoiceStatus::Inviata {
        warnings.push(EditWarning::Transmitted);
    }
    if matches!(invoice.sdi_stato, Some(s) if s != SdiStatus::DaInviare) {
        warnings.push(EditWarning::SdiInProgress);
    }
    if invoice.tipo_documento.is_convertible_draft() && invoice.pagata {
        warnings.push(EditWarning::AcceptedDraft);
    }
    if invoice.tipo_documento == DocumentType::FatturaProforma
        && invoice.convertita_in_id.is_some()
    {
        warnings.push(EditWarning::ConvertedProforma);
    }

    warnings
}

/// Deletion guard: paid documents are never hard-deleted.
pub fn can_delete(invoice: &Invoice) -> Result<(), WorkflowError> {
    if invoice.pagata {
        return Err(WorkflowError::PaidDocument);
    }
    Ok(())
}

/// Whether the document can be converted into a final invoice: it must be
/// a quote or pro-forma, accepted, and not already converted.
pub fn can_convert(invoice: &Invoice) -> Result<(), WorkflowError> {
    if !invoice.tipo_documento.is_convertible_draft() {
        return Err(WorkflowError::NotConvertible(invoice.tipo_documento));
    }
    if !invoice.pagata {
        return Err(WorkflowError::NotAccepted);
    }
    if let Some(id) = invoice.convertita_in_id {
        return Err(WorkflowError::AlreadyConverted(id));
    }
    Ok(())
}

/// Builds the invoice a quote/pro-forma converts into. Monetary fields and
/// line items are copied verbatim; the new row links back through
/// `convertita_da_id` and `fattura_originale_id`. The repository assigns
/// the `FT N/YYYY` number and sets `convertita_in_id` on the original in
/// the same transaction.
pub fn build_conversion(
    original: &Invoice,
    lines: &[InvoiceLine],
    target: DocumentType,
    data: NaiveDate,
) -> Result<(NewInvoice, Vec<NewInvoiceLine>), WorkflowError> {
    can_convert(original)?;

    let nuova = NewInvoice {
        data,
        paziente_id: original.paziente_id,
        tipo_documento: target,
        metodo_pagamento: original.metodo_pagamento.clone(),
        imponibile: original.imponibile,
        iva_importo: original.iva_importo,
        cassa_previdenziale: original.cassa_previdenziale,
        ritenuta_acconto: original.ritenuta_acconto,
        contributo_integrativo: original.contributo_integrativo,
        bollo_virtuale: original.bollo_virtuale,
        totale: original.totale,
        fattura_originale_id: Some(original.id),
        fattura_originale_numero: None,
        fattura_originale_data: None,
        convertita_da_id: Some(original.id),
    };
    let righe = lines.iter().map(InvoiceLine::to_new).collect();

    Ok((nuova, righe))
}

/// Whether a credit note can be issued against the document: only final
/// electronic invoices qualify.
pub fn can_credit(invoice: &Invoice) -> Result<(), WorkflowError> {
    match invoice.tipo_documento {
        DocumentType::FatturaElettronicaPg | DocumentType::FatturaElettronicaPa => Ok(()),
        other => Err(WorkflowError::NotCreditable(other)),
    }
}

/// Builds the credit note reversing an electronic invoice. The original's
/// number and date are mandatory on the note and line items are copied
/// verbatim.
pub fn build_credit_note(
    original: &Invoice,
    lines: &[InvoiceLine],
    data: NaiveDate,
) -> Result<(NewInvoice, Vec<NewInvoiceLine>), WorkflowError> {
    can_credit(original)?;

    let nota = NewInvoice {
        data,
        paziente_id: original.paziente_id,
        tipo_documento: DocumentType::NotaCredito,
        metodo_pagamento: original.metodo_pagamento.clone(),
        imponibile: original.imponibile,
        iva_importo: original.iva_importo,
        cassa_previdenziale: original.cassa_previdenziale,
        ritenuta_acconto: original.ritenuta_acconto,
        contributo_integrativo: original.contributo_integrativo,
        bollo_virtuale: original.bollo_virtuale,
        totale: original.totale,
        fattura_originale_id: Some(original.id),
        fattura_originale_numero: Some(original.numero.clone()),
        fattura_originale_data: Some(original.data),
        convertita_da_id: None,
    };
    let righe = lines.iter().map(InvoiceLine::to_new).collect();

    Ok((nota, righe))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::models::{InvoiceStatus, SdiStatus};

    use super::*;

    fn invoice(tipo: DocumentType) -> Invoice {
        Invoice {
            id: 1,
            numero: "2026/001".to_string(),
            data: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            paziente_id: 7,
            tipo_documento: tipo,
            metodo_pagamento: Some("bonifico".to_string()),
            stato: InvoiceStatus::DaInviare,
            pagata: false,
            data_pagamento: None,
            imponibile: dec!(200.00),
            iva_importo: dec!(45.76),
            cassa_previdenziale: dec!(8.00),
            ritenuta_acconto: dec!(40.00),
            contributo_integrativo: dec!(0),
            bollo_virtuale: dec!(2.00),
            totale: dec!(215.76),
            fattura_originale_id: None,
            fattura_originale_numero: None,
            fattura_originale_data: None,
            convertita_da_id: None,
            convertita_in_id: None,
            sdi_stato: None,
            ts_inviata: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line() -> InvoiceLine {
        InvoiceLine {
            id: 1,
            fattura_id: 1,
            descrizione: "Seduta".to_string(),
            servizio_id: None,
            quantita: dec!(1),
            prezzo_unitario: dec!(100.00),
            sconto_pct: dec!(0),
            codice_iva: "22".to_string(),
        }
    }

    #[test]
    fn natural_person_gets_sanitary_invoice_and_quote_only() {
        let result = allowed_document_types(&PatientKind::PersonaFisica);

        assert_eq!(
            result,
            &[DocumentType::FatturaSanitaria, DocumentType::Preventivo]
        );
    }

    #[test]
    fn legal_entity_gets_electronic_variants() {
        let paziente = PatientKind::PersonaGiuridica {
            codice_destinatario: "ABC1234".to_string(),
        };

        let result = allowed_document_types(&paziente);

        assert_eq!(
            result,
            &[
                DocumentType::FatturaElettronicaPg,
                DocumentType::FatturaElettronicaPa,
                DocumentType::FatturaProforma,
                DocumentType::NotaCredito,
                DocumentType::Preventivo,
            ]
        );
    }

    #[test]
    fn codice_destinatario_length_drives_pa_vs_pg() {
        assert_eq!(
            electronic_invoice_type("UFAB12"),
            DocumentType::FatturaElettronicaPa
        );
        assert_eq!(
            electronic_invoice_type("ABC1234"),
            DocumentType::FatturaElettronicaPg
        );
        assert_eq!(electronic_invoice_type(""), DocumentType::FatturaProforma);
        assert_eq!(
            electronic_invoice_type("X".repeat(10).as_str()),
            DocumentType::FatturaProforma
        );
    }

    #[test]
    fn conversion_target_follows_patient_kind() {
        assert_eq!(
            conversion_target(&PatientKind::PersonaFisica),
            DocumentType::FatturaSanitaria
        );
        assert_eq!(
            conversion_target(&PatientKind::PersonaGiuridica {
                codice_destinatario: "UFAB12".to_string()
            }),
            DocumentType::FatturaElettronicaPa
        );
    }

    #[test]
    fn clean_document_has_no_edit_warnings() {
        let result = edit_warnings(&invoice(DocumentType::FatturaSanitaria));

        assert_eq!(result, vec![]);
    }

    #[test]
    fn paid_invoice_warns_before_editing() {
        let mut fattura = invoice(DocumentType::FatturaSanitaria);
        fattura.pagata = true;

        let result = edit_warnings(&fattura);

        assert_eq!(result, vec![EditWarning::Paid]);
    }

    #[test]
    fn transmitted_invoice_warns_before_editing() {
        let mut fattura = invoice(DocumentType::FatturaElettronicaPg);
        fattura.stato = InvoiceStatus::Inviata;

        let result = edit_warnings(&fattura);

        assert_eq!(result, vec![EditWarning::Transmitted]);
    }

    #[test]
    fn sdi_in_progress_warns_but_to_send_does_not() {
        let mut fattura = invoice(DocumentType::FatturaElettronicaPg);
        fattura.sdi_stato = Some(SdiStatus::DaInviare);
        assert_eq!(edit_warnings(&fattura), vec![]);

        fattura.sdi_stato = Some(SdiStatus::Consegnata);
        assert_eq!(edit_warnings(&fattura), vec![EditWarning::SdiInProgress]);
    }

    #[test]
    fn accepted_quote_warns_before_editing() {
        let mut preventivo = invoice(DocumentType::Preventivo);
        preventivo.pagata = true;

        let result = edit_warnings(&preventivo);

        assert_eq!(result, vec![EditWarning::AcceptedDraft]);
    }

    #[test]
    fn converted_proforma_warns_before_editing() {
        let mut proforma = invoice(DocumentType::FatturaProforma);
        proforma.convertita_in_id = Some(9);

        let result = edit_warnings(&proforma);

        assert_eq!(result, vec![EditWarning::ConvertedProforma]);
    }

    #[test]
    fn paid_documents_cannot_be_deleted() {
        let mut fattura = invoice(DocumentType::FatturaSanitaria);
        fattura.pagata = true;

        assert_eq!(can_delete(&fattura), Err(WorkflowError::PaidDocument));
        assert_eq!(can_delete(&invoice(DocumentType::FatturaSanitaria)), Ok(()));
    }

    #[test]
    fn only_accepted_drafts_can_convert() {
        let mut preventivo = invoice(DocumentType::Preventivo);
        assert_eq!(can_convert(&preventivo), Err(WorkflowError::NotAccepted));

        preventivo.pagata = true;
        assert_eq!(can_convert(&preventivo), Ok(()));
    }

    #[test]
    fn final_invoices_cannot_convert() {
        let fattura = invoice(DocumentType::FatturaSanitaria);

        assert_eq!(
            can_convert(&fattura),
            Err(WorkflowError::NotConvertible(
                DocumentType::FatturaSanitaria
            ))
        );
    }

    #[test]
    fn already_converted_draft_cannot_convert_again() {
        let mut proforma = invoice(DocumentType::FatturaProforma);
        proforma.pagata = true;
        proforma.convertita_in_id = Some(42);

        assert_eq!(
            can_convert(&proforma),
            Err(WorkflowError::AlreadyConverted(42))
        );
    }

    #[test]
    fn conversion_copies_totals_and_links_the_original() {
        let mut preventivo = invoice(DocumentType::Preventivo);
        preventivo.pagata = true;
        let data = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

        let (nuova, righe) = build_conversion(
            &preventivo,
            &[line()],
            DocumentType::FatturaSanitaria,
            data,
        )
        .unwrap();

        assert_eq!(nuova.tipo_documento, DocumentType::FatturaSanitaria);
        assert_eq!(nuova.totale, preventivo.totale);
        assert_eq!(nuova.convertita_da_id, Some(preventivo.id));
        assert_eq!(nuova.fattura_originale_id, Some(preventivo.id));
        assert_eq!(righe.len(), 1);
        assert_eq!(righe[0].descrizione, "Seduta");
    }

    #[test]
    fn credit_note_requires_an_electronic_invoice() {
        let sanitaria = invoice(DocumentType::FatturaSanitaria);

        assert_eq!(
            can_credit(&sanitaria),
            Err(WorkflowError::NotCreditable(
                DocumentType::FatturaSanitaria
            ))
        );
    }

    #[test]
    fn credit_note_carries_original_number_and_date() {
        let fattura = invoice(DocumentType::FatturaElettronicaPg);
        let data = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();

        let (nota, righe) = build_credit_note(&fattura, &[line()], data).unwrap();

        assert_eq!(nota.tipo_documento, DocumentType::NotaCredito);
        assert_eq!(nota.fattura_originale_id, Some(fattura.id));
        assert_eq!(nota.fattura_originale_numero, Some(fattura.numero.clone()));
        assert_eq!(nota.fattura_originale_data, Some(fattura.data));
        assert_eq!(righe[0].codice_iva, "22");
    }
}
