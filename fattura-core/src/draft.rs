//! In-memory document draft.
//!
//! The creation dialog's state is modelled as an immutable
//! [`InvoiceDraft`] advanced by a pure reducer
//! ([`InvoiceDraft::apply`]): every form interaction is one
//! [`DraftAction`], and totals are recomputed on every action.
//!
//! Surcharge amounts live in one of two explicit modes:
//!
//! * [`SurchargeMode::Derived`] — the four amounts are recomputed from the
//!   detail rows and the active toggles on every action.
//! * [`SurchargeMode::Overridden`] — entered once the user hand-edits a
//!   surcharge amount. The amounts are frozen; imponibile, VAT and the
//!   grand total still track the rows so the document invariant always
//!   holds. Toggling a surcharge recomputes that one amount from the
//!   current imponibile even while overridden.
//!
//! Numeric form input arrives as raw strings and is coerced to zero when
//! unparseable, matching the dialog's parse-with-fallback behaviour —
//! a malformed price never aborts the edit, it just contributes nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::calculations::common::round_half_up;
use crate::calculations::{BolloCarico, InvoiceTotals, SurchargeConfig, TotalsCalculator};
use crate::models::{DocumentType, NewInvoice, NewInvoiceLine};

/// Validation failures that block saving the draft.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("the document has no detail rows")]
    NoLines,

    #[error("no patient selected")]
    MissingPatient,

    #[error("a credit note requires the original invoice number")]
    MissingOriginalNumber,

    #[error("a credit note requires the original invoice date")]
    MissingOriginalDate,
}

/// Whether surcharge amounts follow the rows or a manual edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurchargeMode {
    Derived,
    Overridden,
}

/// One form interaction on the draft.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftAction {
    AddLine,
    RemoveLine { index: usize },
    SetDescrizione { index: usize, value: String },
    SetServizio { index: usize, servizio_id: Option<i64> },
    SetQuantita { index: usize, raw: String },
    SetPrezzo { index: usize, raw: String },
    SetSconto { index: usize, raw: String },
    SetCodiceIva { index: usize, value: String },

    SetRivalsaAttiva(bool),
    SetRivalsaPct { raw: String },
    SetRitenutaAttiva(bool),
    SetRitenutaPct { raw: String },
    SetBolloAttivo(bool),
    SetBolloCarico(BolloCarico),

    /// Hand-edits freeze automatic recomputation of the surcharges.
    OverrideCassa { raw: String },
    OverrideRitenuta { raw: String },
    OverrideBollo { raw: String },

    SetTipoDocumento(DocumentType),
    SetData(NaiveDate),
    SetMetodoPagamento(Option<String>),
    SetPaziente(i64),
    SetFatturaOriginaleNumero(String),
    SetFatturaOriginaleData(Option<NaiveDate>),
}

/// The draft being edited in the creation dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub tipo_documento: DocumentType,
    pub data: NaiveDate,
    pub paziente_id: Option<i64>,
    pub metodo_pagamento: Option<String>,
    pub righe: Vec<NewInvoiceLine>,
    pub config: SurchargeConfig,
    pub mode: SurchargeMode,
    pub totals: InvoiceTotals,

    // Credit-note reference, mandatory when tipo_documento is NotaCredito
    pub fattura_originale_id: Option<i64>,
    pub fattura_originale_numero: Option<String>,
    pub fattura_originale_data: Option<NaiveDate>,
}

/// Form-input coercion: trim, accept the Italian decimal comma, and fall
/// back to zero for anything unparseable.
fn parse_importo(raw: &str) -> Decimal {
    let cleaned = raw.trim().replace(',', ".");
    cleaned.parse().unwrap_or(Decimal::ZERO)
}

fn empty_line() -> NewInvoiceLine {
    NewInvoiceLine {
        descrizione: String::new(),
        servizio_id: None,
        quantita: Decimal::ONE,
        prezzo_unitario: Decimal::ZERO,
        sconto_pct: Decimal::ZERO,
        codice_iva: "22".to_string(),
    }
}

impl InvoiceDraft {
    /// A fresh draft for the given date: one empty row, everything else
    /// off, totals zero.
    pub fn new(tipo_documento: DocumentType, data: NaiveDate) -> Self {
        Self {
            tipo_documento,
            data,
            paziente_id: None,
            metodo_pagamento: None,
            righe: vec![empty_line()],
            config: SurchargeConfig::default(),
            mode: SurchargeMode::Derived,
            totals: InvoiceTotals::zero(),
            fattura_originale_id: None,
            fattura_originale_numero: None,
            fattura_originale_data: None,
        }
    }

    /// Applies one action and returns the updated draft with totals
    /// recomputed. The reducer never fails: out-of-range line values keep
    /// the previous totals and log a warning.
    pub fn apply(mut self, action: DraftAction) -> Self {
        match action {
            DraftAction::AddLine => self.righe.push(empty_line()),
            DraftAction::RemoveLine { index } => {
                if index < self.righe.len() {
                    self.righe.remove(index);
                }
            }
            DraftAction::SetDescrizione { index, value } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.descrizione = value;
                }
            }
            DraftAction::SetServizio { index, servizio_id } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.servizio_id = servizio_id;
                }
            }
            DraftAction::SetQuantita { index, raw } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.quantita = parse_importo(&raw);
                }
            }
            DraftAction::SetPrezzo { index, raw } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.prezzo_unitario = parse_importo(&raw);
                }
            }
            DraftAction::SetSconto { index, raw } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.sconto_pct = parse_importo(&raw);
                }
            }
            DraftAction::SetCodiceIva { index, value } => {
                if let Some(riga) = self.righe.get_mut(index) {
                    riga.codice_iva = value;
                }
            }

            DraftAction::SetRivalsaAttiva(attiva) => {
                self.config.rivalsa_attiva = attiva;
                self.retoggle_cassa();
            }
            DraftAction::SetRivalsaPct { raw } => {
                self.config.rivalsa_pct = parse_importo(&raw);
                self.retoggle_cassa();
            }
            DraftAction::SetRitenutaAttiva(attiva) => {
                self.config.ritenuta_attiva = attiva;
                self.retoggle_ritenuta();
            }
            DraftAction::SetRitenutaPct { raw } => {
                self.config.ritenuta_pct = parse_importo(&raw);
                self.retoggle_ritenuta();
            }
            DraftAction::SetBolloAttivo(attivo) => {
                self.config.bollo_attivo = attivo;
                self.retoggle_bollo();
            }
            DraftAction::SetBolloCarico(carico) => {
                self.config.bollo_a_carico = carico;
                self.retoggle_bollo();
            }

            DraftAction::OverrideCassa { raw } => {
                self.mode = SurchargeMode::Overridden;
                self.totals.cassa_previdenziale = parse_importo(&raw);
            }
            DraftAction::OverrideRitenuta { raw } => {
                self.mode = SurchargeMode::Overridden;
                self.totals.ritenuta_acconto = parse_importo(&raw);
            }
            DraftAction::OverrideBollo { raw } => {
                self.mode = SurchargeMode::Overridden;
                self.totals.bollo_virtuale = parse_importo(&raw);
            }

            DraftAction::SetTipoDocumento(tipo) => self.tipo_documento = tipo,
            DraftAction::SetData(data) => self.data = data,
            DraftAction::SetMetodoPagamento(metodo) => self.metodo_pagamento = metodo,
            DraftAction::SetPaziente(id) => self.paziente_id = Some(id),
            DraftAction::SetFatturaOriginaleNumero(numero) => {
                self.fattura_originale_numero =
                    if numero.trim().is_empty() { None } else { Some(numero) };
            }
            DraftAction::SetFatturaOriginaleData(data) => self.fattura_originale_data = data,
        }

        self.recompute();
        self
    }

    /// While overridden, a surcharge toggle still recomputes that one
    /// amount from the current imponibile; in derived mode the general
    /// recompute takes care of it.
    fn retoggle_cassa(&mut self) {
        if self.mode == SurchargeMode::Overridden {
            self.totals.cassa_previdenziale = if self.config.rivalsa_attiva {
                round_half_up(
                    self.totals.imponibile * self.config.rivalsa_pct / Decimal::ONE_HUNDRED,
                )
            } else {
                Decimal::ZERO
            };
        }
    }

    fn retoggle_ritenuta(&mut self) {
        if self.mode == SurchargeMode::Overridden {
            self.totals.ritenuta_acconto = if self.config.ritenuta_attiva {
                round_half_up(
                    self.totals.imponibile * self.config.ritenuta_pct / Decimal::ONE_HUNDRED,
                )
            } else {
                Decimal::ZERO
            };
        }
    }

    fn retoggle_bollo(&mut self) {
        if self.mode == SurchargeMode::Overridden {
            self.totals.bollo_virtuale = if self.config.bollo_attivo
                && self.totals.imponibile > self.config.bollo_soglia
                && self.config.bollo_a_carico == BolloCarico::Paziente
            {
                round_half_up(self.config.bollo_importo)
            } else {
                Decimal::ZERO
            };
        }
    }

    fn recompute(&mut self) {
        let calculator = TotalsCalculator::new(self.config.clone());
        let result = match self.mode {
            SurchargeMode::Derived => calculator.calculate(&self.righe),
            SurchargeMode::Overridden => calculator.calculate_with_fixed_surcharges(
                &self.righe,
                self.totals.cassa_previdenziale,
                self.totals.ritenuta_acconto,
                self.totals.bollo_virtuale,
            ),
        };
        match result {
            Ok(totals) => self.totals = totals,
            Err(e) => warn!(error = %e, "draft totals not recomputed"),
        }
    }

    /// Blocking validation performed on save.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.righe.is_empty() {
            return Err(DraftError::NoLines);
        }
        if self.paziente_id.is_none() {
            return Err(DraftError::MissingPatient);
        }
        if self.tipo_documento == DocumentType::NotaCredito {
            if self
                .fattura_originale_numero
                .as_deref()
                .is_none_or(|n| n.trim().is_empty())
            {
                return Err(DraftError::MissingOriginalNumber);
            }
            if self.fattura_originale_data.is_none() {
                return Err(DraftError::MissingOriginalDate);
            }
        }
        Ok(())
    }

    /// Validates and produces the record to persist, plus its detail rows.
    pub fn into_new_invoice(self) -> Result<(NewInvoice, Vec<NewInvoiceLine>), DraftError> {
        self.validate()?;
        let paziente_id = self.paziente_id.ok_or(DraftError::MissingPatient)?;

        let nuova = NewInvoice {
            data: self.data,
            paziente_id,
            tipo_documento: self.tipo_documento,
            metodo_pagamento: self.metodo_pagamento,
            imponibile: self.totals.imponibile,
            iva_importo: self.totals.iva_importo,
            cassa_previdenziale: self.totals.cassa_previdenziale,
            ritenuta_acconto: self.totals.ritenuta_acconto,
            contributo_integrativo: self.totals.contributo_integrativo,
            bollo_virtuale: self.totals.bollo_virtuale,
            totale: self.totals.totale,
            fattura_originale_id: self.fattura_originale_id,
            fattura_originale_numero: self.fattura_originale_numero,
            fattura_originale_data: self.fattura_originale_data,
            convertita_da_id: None,
        };
        Ok((nuova, self.righe))
    }
}
