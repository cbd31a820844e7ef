//! Invoice totals calculation.
//!
//! Computes the totals block of an Italian professional invoice from its
//! detail rows and the active fiscal surcharges:
//!
//! | Voce                    | Description |
//! |-------------------------|-------------|
//! | Imponibile              | Sum of line taxable amounts (qty × price × (1 − discount)) |
//! | Cassa previdenziale     | Social-security surcharge (rivalsa), % of imponibile |
//! | IVA                     | Per-line VAT on the line's share of imponibile + rivalsa |
//! | Ritenuta d'acconto      | Withholding tax, % of imponibile alone |
//! | Contributo integrativo  | Carried field, always zero |
//! | Bollo virtuale          | Stamp duty above the statutory threshold |
//! | Totale                  | imponibile + IVA + cassa + contributo + bollo − ritenuta |
//!
//! The rivalsa surcharge is distributed across lines pro-rata before VAT is
//! applied at each line's own rate, so mixed-rate invoices tax the
//! surcharge at the correct rates.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use fattura_core::NewInvoiceLine;
//! use fattura_core::calculations::{BolloCarico, SurchargeConfig, TotalsCalculator};
//!
//! let lines = vec![
//!     NewInvoiceLine {
//!         descrizione: "Prima visita".to_string(),
//!         servizio_id: None,
//!         quantita: dec!(1),
//!         prezzo_unitario: dec!(100.00),
//!         sconto_pct: dec!(0),
//!         codice_iva: "22".to_string(),
//!     },
//!     NewInvoiceLine {
//!         descrizione: "Seduta di controllo".to_string(),
//!         servizio_id: None,
//!         quantita: dec!(2),
//!         prezzo_unitario: dec!(50.00),
//!         sconto_pct: dec!(0),
//!         codice_iva: "22".to_string(),
//!     },
//! ];
//!
//! let config = SurchargeConfig {
//!     rivalsa_attiva: true,
//!     rivalsa_pct: dec!(4),
//!     ritenuta_attiva: true,
//!     ritenuta_pct: dec!(20),
//!     bollo_attivo: true,
//!     bollo_importo: dec!(2.00),
//!     bollo_soglia: dec!(77.47),
//!     bollo_a_carico: BolloCarico::Paziente,
//! };
//!
//! let totals = TotalsCalculator::new(config).calculate(&lines).unwrap();
//!
//! assert_eq!(totals.imponibile, dec!(200.00));
//! assert_eq!(totals.cassa_previdenziale, dec!(8.00));
//! assert_eq!(totals.iva_importo, dec!(45.76));
//! assert_eq!(totals.ritenuta_acconto, dec!(40.00));
//! assert_eq!(totals.bollo_virtuale, dec!(2.00));
//! assert_eq!(totals.totale, dec!(215.76));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::round_half_up;
use crate::calculations::iva::aliquota_iva;
use crate::models::NewInvoiceLine;

/// Errors that can occur during totals calculation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TotalsError {
    /// The rivalsa percentage must be between 0 and 100.
    #[error("rivalsa percentage must be between 0 and 100, got {0}")]
    InvalidRivalsaPct(Decimal),

    /// The ritenuta percentage must be between 0 and 100.
    #[error("ritenuta percentage must be between 0 and 100, got {0}")]
    InvalidRitenutaPct(Decimal),

    /// The stamp-duty amount must be non-negative.
    #[error("bollo amount must be non-negative, got {0}")]
    InvalidBolloImporto(Decimal),

    /// The stamp-duty threshold must be non-negative.
    #[error("bollo threshold must be non-negative, got {0}")]
    InvalidBolloSoglia(Decimal),

    /// A line quantity was negative.
    #[error("line quantity must be non-negative, got {0}")]
    NegativeQuantity(Decimal),

    /// A line unit price was negative.
    #[error("line unit price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    /// A line discount was outside 0–100.
    #[error("line discount must be between 0 and 100, got {0}")]
    InvalidDiscount(Decimal),
}

/// Who the stamp duty is charged to. When the professional absorbs it, the
/// duty still nominally exists but the amount charged on the document is
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BolloCarico {
    Paziente,
    Professionista,
}

/// Fiscal surcharge toggles and rates.
///
/// Each surcharge has an independent on/off toggle; a disabled surcharge
/// contributes zero regardless of its configured rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeConfig {
    /// Whether the cassa previdenziale surcharge is applied.
    pub rivalsa_attiva: bool,
    /// Rivalsa rate, e.g. 4 for the ENPAP/ENPAB 4%.
    pub rivalsa_pct: Decimal,

    /// Whether the withholding tax is applied.
    pub ritenuta_attiva: bool,
    /// Ritenuta d'acconto rate, typically 20.
    pub ritenuta_pct: Decimal,

    /// Whether virtual stamp duty is applied.
    pub bollo_attivo: bool,
    /// Stamp-duty amount, statutory €2.00.
    pub bollo_importo: Decimal,
    /// Imponibile threshold above which the duty is due, statutory €77.47.
    pub bollo_soglia: Decimal,
    /// Liable party for the duty.
    pub bollo_a_carico: BolloCarico,
}

impl Default for SurchargeConfig {
    /// Everything off, statutory bollo amount and threshold, duty charged
    /// to the patient.
    fn default() -> Self {
        Self {
            rivalsa_attiva: false,
            rivalsa_pct: Decimal::ZERO,
            ritenuta_attiva: false,
            ritenuta_pct: Decimal::ZERO,
            bollo_attivo: false,
            bollo_importo: Decimal::new(200, 2),
            bollo_soglia: Decimal::new(7747, 2),
            bollo_a_carico: BolloCarico::Paziente,
        }
    }
}

impl SurchargeConfig {
    /// Validates rates and amounts.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] if a percentage is outside 0–100 or an
    /// amount/threshold is negative.
    pub fn validate(&self) -> Result<(), TotalsError> {
        if self.rivalsa_pct < Decimal::ZERO || self.rivalsa_pct > Decimal::ONE_HUNDRED {
            return Err(TotalsError::InvalidRivalsaPct(self.rivalsa_pct));
        }
        if self.ritenuta_pct < Decimal::ZERO || self.ritenuta_pct > Decimal::ONE_HUNDRED {
            return Err(TotalsError::InvalidRitenutaPct(self.ritenuta_pct));
        }
        if self.bollo_importo < Decimal::ZERO {
            return Err(TotalsError::InvalidBolloImporto(self.bollo_importo));
        }
        if self.bollo_soglia < Decimal::ZERO {
            return Err(TotalsError::InvalidBolloSoglia(self.bollo_soglia));
        }
        Ok(())
    }
}

/// Computed totals block, all amounts rounded half-up to 2 dp.
///
/// Invariant: `totale = imponibile + iva_importo + cassa_previdenziale +
/// contributo_integrativo + bollo_virtuale - ritenuta_acconto`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub imponibile: Decimal,
    pub cassa_previdenziale: Decimal,
    pub iva_importo: Decimal,
    pub ritenuta_acconto: Decimal,
    pub contributo_integrativo: Decimal,
    pub bollo_virtuale: Decimal,
    pub totale: Decimal,
}

impl InvoiceTotals {
    /// All-zero totals, the result of calculating an empty document.
    pub fn zero() -> Self {
        Self {
            imponibile: Decimal::ZERO,
            cassa_previdenziale: Decimal::ZERO,
            iva_importo: Decimal::ZERO,
            ritenuta_acconto: Decimal::ZERO,
            contributo_integrativo: Decimal::ZERO,
            bollo_virtuale: Decimal::ZERO,
            totale: Decimal::ZERO,
        }
    }
}

/// Calculator for the invoice totals block.
///
/// Pure function of (detail rows, surcharge config): no hidden state, safe
/// to re-run on every edit of the document.
#[derive(Debug, Clone)]
pub struct TotalsCalculator {
    config: SurchargeConfig,
}

impl TotalsCalculator {
    pub fn new(config: SurchargeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurchargeConfig {
        &self.config
    }

    /// Calculates the complete totals block for the given detail rows.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] if the configuration is invalid or a line
    /// carries a negative quantity/price or an out-of-range discount.
    pub fn calculate(&self, lines: &[NewInvoiceLine]) -> Result<InvoiceTotals, TotalsError> {
        self.config.validate()?;
        for line in lines {
            if line.quantita < Decimal::ZERO {
                return Err(TotalsError::NegativeQuantity(line.quantita));
            }
            if line.prezzo_unitario < Decimal::ZERO {
                return Err(TotalsError::NegativePrice(line.prezzo_unitario));
            }
            if line.sconto_pct < Decimal::ZERO || line.sconto_pct > Decimal::ONE_HUNDRED {
                return Err(TotalsError::InvalidDiscount(line.sconto_pct));
            }
        }

        let imponibile = round_half_up(lines.iter().map(NewInvoiceLine::imponibile).sum());

        // Rivalsa is computed on imponibile alone, never on VAT.
        let cassa_previdenziale = if self.config.rivalsa_attiva {
            round_half_up(imponibile * self.config.rivalsa_pct / Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };

        let iva_importo = round_half_up(self.vat_total(lines, imponibile, cassa_previdenziale));

        // Ritenuta is withheld on imponibile alone, not on the
        // surcharge-inclusive base.
        let ritenuta_acconto = if self.config.ritenuta_attiva {
            round_half_up(imponibile * self.config.ritenuta_pct / Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };

        let bollo_virtuale = self.bollo(imponibile);
        let contributo_integrativo = Decimal::ZERO;

        let totale = round_half_up(
            imponibile + iva_importo + cassa_previdenziale + contributo_integrativo
                + bollo_virtuale
                - ritenuta_acconto,
        );

        Ok(InvoiceTotals {
            imponibile,
            cassa_previdenziale,
            iva_importo,
            ritenuta_acconto,
            contributo_integrativo,
            bollo_virtuale,
            totale,
        })
    }

    /// Recalculates totals around hand-edited surcharge amounts.
    ///
    /// Used when the user has overridden the automatic surcharge values:
    /// the imponibile and per-line VAT are still derived from the rows
    /// (VAT distributes the *given* cassa pro-rata), the surcharges are
    /// taken as-is, and the grand total keeps the document invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TotalsError`] for the same line-level problems as
    /// [`Self::calculate`].
    pub fn calculate_with_fixed_surcharges(
        &self,
        lines: &[NewInvoiceLine],
        cassa_previdenziale: Decimal,
        ritenuta_acconto: Decimal,
        bollo_virtuale: Decimal,
    ) -> Result<InvoiceTotals, TotalsError> {
        for line in lines {
            if line.quantita < Decimal::ZERO {
                return Err(TotalsError::NegativeQuantity(line.quantita));
            }
            if line.prezzo_unitario < Decimal::ZERO {
                return Err(TotalsError::NegativePrice(line.prezzo_unitario));
            }
            if line.sconto_pct < Decimal::ZERO || line.sconto_pct > Decimal::ONE_HUNDRED {
                return Err(TotalsError::InvalidDiscount(line.sconto_pct));
            }
        }

        let imponibile = round_half_up(lines.iter().map(NewInvoiceLine::imponibile).sum());
        let cassa_previdenziale = round_half_up(cassa_previdenziale);
        let ritenuta_acconto = round_half_up(ritenuta_acconto);
        let bollo_virtuale = round_half_up(bollo_virtuale);
        let iva_importo = round_half_up(self.vat_total(lines, imponibile, cassa_previdenziale));
        let contributo_integrativo = Decimal::ZERO;
        let totale = round_half_up(
            imponibile + iva_importo + cassa_previdenziale + contributo_integrativo
                + bollo_virtuale
                - ritenuta_acconto,
        );

        Ok(InvoiceTotals {
            imponibile,
            cassa_previdenziale,
            iva_importo,
            ritenuta_acconto,
            contributo_integrativo,
            bollo_virtuale,
            totale,
        })
    }

    /// Sums per-line VAT. Each line's VAT base is its own taxable amount
    /// plus its pro-rata share of the rivalsa surcharge; the proportion is
    /// zero when imponibile is zero.
    fn vat_total(
        &self,
        lines: &[NewInvoiceLine],
        imponibile: Decimal,
        cassa_previdenziale: Decimal,
    ) -> Decimal {
        lines
            .iter()
            .map(|line| {
                let line_imponibile = line.imponibile();
                let quota_rivalsa = if imponibile > Decimal::ZERO {
                    cassa_previdenziale * (line_imponibile / imponibile)
                } else {
                    Decimal::ZERO
                };
                let base = line_imponibile + quota_rivalsa;
                base * aliquota_iva(&line.codice_iva) / Decimal::ONE_HUNDRED
            })
            .sum()
    }

    /// Stamp duty applies only when active, above the statutory threshold,
    /// and charged to the patient.
    fn bollo(&self, imponibile: Decimal) -> Decimal {
        if self.config.bollo_attivo
            && imponibile > self.config.bollo_soglia
            && self.config.bollo_a_carico == BolloCarico::Paziente
        {
            round_half_up(self.config.bollo_importo)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn line(quantita: Decimal, prezzo: Decimal, sconto: Decimal, codice: &str) -> NewInvoiceLine {
        NewInvoiceLine {
            descrizione: "Seduta".to_string(),
            servizio_id: None,
            quantita,
            prezzo_unitario: prezzo,
            sconto_pct: sconto,
            codice_iva: codice.to_string(),
        }
    }

    fn full_config() -> SurchargeConfig {
        SurchargeConfig {
            rivalsa_attiva: true,
            rivalsa_pct: dec!(4),
            ritenuta_attiva: true,
            ritenuta_pct: dec!(20),
            bollo_attivo: true,
            bollo_importo: dec!(2.00),
            bollo_soglia: dec!(77.47),
            bollo_a_carico: BolloCarico::Paziente,
        }
    }

    #[test]
    fn reference_scenario_matches_expected_totals() {
        let lines = vec![
            line(dec!(1), dec!(100.00), dec!(0), "22"),
            line(dec!(2), dec!(50.00), dec!(0), "22"),
        ];

        let totals = TotalsCalculator::new(full_config()).calculate(&lines).unwrap();

        assert_eq!(totals.imponibile, dec!(200.00));
        assert_eq!(totals.cassa_previdenziale, dec!(8.00));
        assert_eq!(totals.iva_importo, dec!(45.76));
        assert_eq!(totals.ritenuta_acconto, dec!(40.00));
        assert_eq!(totals.contributo_integrativo, dec!(0));
        assert_eq!(totals.bollo_virtuale, dec!(2.00));
        assert_eq!(totals.totale, dec!(215.76));
    }

    #[test]
    fn empty_document_yields_zero_totals() {
        let totals = TotalsCalculator::new(full_config()).calculate(&[]).unwrap();

        assert_eq!(totals, InvoiceTotals::zero());
    }

    #[test]
    fn totale_invariant_holds() {
        let lines = vec![
            line(dec!(3), dec!(45.50), dec!(10), "22"),
            line(dec!(1), dec!(80.00), dec!(0), "N4"),
            line(dec!(2), dec!(19.99), dec!(5), "10"),
        ];

        let totals = TotalsCalculator::new(full_config()).calculate(&lines).unwrap();

        assert_eq!(
            totals.totale,
            totals.imponibile + totals.iva_importo + totals.cassa_previdenziale
                + totals.contributo_integrativo
                + totals.bollo_virtuale
                - totals.ritenuta_acconto
        );
    }

    #[test]
    fn rivalsa_is_distributed_pro_rata_before_vat() {
        // One line at 22%, one exempt. Only the taxed line's share of the
        // rivalsa may attract VAT.
        let lines = vec![
            line(dec!(1), dec!(100.00), dec!(0), "22"),
            line(dec!(1), dec!(100.00), dec!(0), "N1"),
        ];
        let mut config = full_config();
        config.ritenuta_attiva = false;
        config.bollo_attivo = false;

        let totals = TotalsCalculator::new(config).calculate(&lines).unwrap();

        // imponibile 200, cassa 8, taxed line base 100 + 8*(100/200) = 104
        assert_eq!(totals.imponibile, dec!(200.00));
        assert_eq!(totals.cassa_previdenziale, dec!(8.00));
        assert_eq!(totals.iva_importo, dec!(22.88));
    }

    #[test]
    fn inactive_surcharges_contribute_zero() {
        let lines = vec![line(dec!(1), dec!(100.00), dec!(0), "22")];
        let config = SurchargeConfig {
            rivalsa_pct: dec!(4),
            ritenuta_pct: dec!(20),
            ..SurchargeConfig::default()
        };

        let totals = TotalsCalculator::new(config).calculate(&lines).unwrap();

        assert_eq!(totals.cassa_previdenziale, dec!(0));
        assert_eq!(totals.ritenuta_acconto, dec!(0));
        assert_eq!(totals.bollo_virtuale, dec!(0));
        assert_eq!(totals.totale, dec!(122.00));
    }

    #[test]
    fn bollo_requires_threshold_to_be_exceeded() {
        let mut config = full_config();
        config.rivalsa_attiva = false;
        config.ritenuta_attiva = false;
        let calculator = TotalsCalculator::new(config);

        let below = calculator
            .calculate(&[line(dec!(1), dec!(77.47), dec!(0), "N4")])
            .unwrap();
        let above = calculator
            .calculate(&[line(dec!(1), dec!(77.48), dec!(0), "N4")])
            .unwrap();

        // Exactly at the threshold the duty is not due.
        assert_eq!(below.bollo_virtuale, dec!(0));
        assert_eq!(above.bollo_virtuale, dec!(2.00));
    }

    #[test]
    fn bollo_charged_to_professional_is_zero_on_the_document() {
        let mut config = full_config();
        config.bollo_a_carico = BolloCarico::Professionista;

        let totals = TotalsCalculator::new(config)
            .calculate(&[line(dec!(1), dec!(100.00), dec!(0), "N4")])
            .unwrap();

        assert_eq!(totals.bollo_virtuale, dec!(0));
    }

    #[test]
    fn ritenuta_is_computed_on_imponibile_alone() {
        // Rivalsa and VAT must not inflate the withholding base.
        let lines = vec![line(dec!(1), dec!(100.00), dec!(0), "22")];

        let totals = TotalsCalculator::new(full_config()).calculate(&lines).unwrap();

        assert_eq!(totals.ritenuta_acconto, dec!(20.00));
    }

    #[test]
    fn zero_imponibile_with_rivalsa_active_does_not_divide_by_zero() {
        let lines = vec![line(dec!(0), dec!(100.00), dec!(0), "22")];

        let totals = TotalsCalculator::new(full_config()).calculate(&lines).unwrap();

        assert_eq!(totals.imponibile, dec!(0.00));
        assert_eq!(totals.iva_importo, dec!(0.00));
        assert_eq!(totals.totale, dec!(0.00));
    }

    #[test]
    fn mixed_vat_rates_are_applied_per_line() {
        let lines = vec![
            line(dec!(1), dec!(100.00), dec!(0), "22"),
            line(dec!(1), dec!(100.00), dec!(0), "10"),
        ];
        let config = SurchargeConfig::default();

        let totals = TotalsCalculator::new(config).calculate(&lines).unwrap();

        assert_eq!(totals.iva_importo, dec!(32.00));
    }

    #[test]
    fn discount_reduces_the_taxable_base() {
        let lines = vec![line(dec!(1), dec!(200.00), dec!(50), "22")];

        let totals = TotalsCalculator::new(SurchargeConfig::default())
            .calculate(&lines)
            .unwrap();

        assert_eq!(totals.imponibile, dec!(100.00));
    }

    #[test]
    fn rejects_negative_quantity() {
        let lines = vec![line(dec!(-1), dec!(100.00), dec!(0), "22")];

        let result = TotalsCalculator::new(SurchargeConfig::default()).calculate(&lines);

        assert_eq!(result, Err(TotalsError::NegativeQuantity(dec!(-1))));
    }

    #[test]
    fn rejects_out_of_range_discount() {
        let lines = vec![line(dec!(1), dec!(100.00), dec!(101), "22")];

        let result = TotalsCalculator::new(SurchargeConfig::default()).calculate(&lines);

        assert_eq!(result, Err(TotalsError::InvalidDiscount(dec!(101))));
    }

    #[test]
    fn rejects_invalid_rivalsa_percentage() {
        let config = SurchargeConfig {
            rivalsa_attiva: true,
            rivalsa_pct: dec!(120),
            ..SurchargeConfig::default()
        };

        let result = TotalsCalculator::new(config).calculate(&[]);

        assert_eq!(result, Err(TotalsError::InvalidRivalsaPct(dec!(120))));
    }

    #[test]
    fn fixed_surcharges_keep_the_totale_invariant() {
        let lines = vec![line(dec!(1), dec!(100.00), dec!(0), "22")];

        let totals = TotalsCalculator::new(SurchargeConfig::default())
            .calculate_with_fixed_surcharges(&lines, dec!(5.00), dec!(20.00), dec!(2.00))
            .unwrap();

        // VAT taxes the hand-edited cassa: (100 + 5) * 22% = 23.10
        assert_eq!(totals.imponibile, dec!(100.00));
        assert_eq!(totals.iva_importo, dec!(23.10));
        assert_eq!(totals.totale, dec!(110.10));
    }

    #[test]
    fn per_line_vat_bases_sum_to_imponibile_plus_rivalsa() {
        // With a single uniform 100% "rate" the VAT total equals the sum of
        // the bases, which must be imponibile + cassa.
        let lines = vec![
            line(dec!(1), dec!(60.00), dec!(0), "100"),
            line(dec!(2), dec!(70.00), dec!(0), "100"),
        ];
        let mut config = full_config();
        config.ritenuta_attiva = false;
        config.bollo_attivo = false;

        let totals = TotalsCalculator::new(config).calculate(&lines).unwrap();

        assert_eq!(
            totals.iva_importo,
            totals.imponibile + totals.cassa_previdenziale
        );
    }
}
