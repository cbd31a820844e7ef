use serde::{Deserialize, Serialize};

/// The fiscal nature of the patient, which constrains the document types
/// that may be issued to them (see
/// [`crate::workflow::allowed_document_types`]).
///
/// Legal entities carry the SDI "codice destinatario" used to route
/// electronic invoices; its length distinguishes public administration
/// (6 characters) from private companies (7 characters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientKind {
    PersonaFisica,
    PersonaGiuridica { codice_destinatario: String },
}

impl PatientKind {
    pub fn is_persona_fisica(&self) -> bool {
        matches!(self, Self::PersonaFisica)
    }
}
