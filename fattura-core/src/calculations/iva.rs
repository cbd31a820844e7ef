//! VAT-code resolution.
//!
//! Service rows carry a VAT *code* rather than a percentage: either a bare
//! numeric rate (`"22"`, `"10"`, `"5"`, `"4"`) or one of the Italian
//! exemption/exclusion codes (`N1`…`N7`), which all map to 0%. Free-text
//! codes are scanned for an embedded percentage as a last resort.
//!
//! Resolution is total: anything unrecognized maps to 0%, so a malformed
//! code never silently overcharges VAT.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

static PERCENT_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*%").expect("valid regex literal"));

/// Resolves a VAT code to its percentage.
///
/// Preference order: exact numeric match, then explicit exemption codes
/// (`N`-prefixed or containing `esente`) mapping to 0%, then a percentage
/// extracted from free text, then 0%.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use fattura_core::calculations::aliquota_iva;
///
/// assert_eq!(aliquota_iva("22"), dec!(22));
/// assert_eq!(aliquota_iva("N4"), dec!(0));
/// assert_eq!(aliquota_iva("IVA 10% ridotta"), dec!(10));
/// assert_eq!(aliquota_iva(""), dec!(0));
/// assert_eq!(aliquota_iva("garbage"), dec!(0));
/// ```
pub fn aliquota_iva(codice: &str) -> Decimal {
    let codice = codice.trim();

    if let Ok(pct) = codice.parse::<Decimal>() {
        return pct;
    }

    let upper = codice.to_uppercase();
    if upper.starts_with('N') || upper.contains("ESENTE") {
        return Decimal::ZERO;
    }

    if let Some(caps) = PERCENT_IN_TEXT.captures(codice) {
        let raw = caps[1].replace(',', ".");
        if let Ok(pct) = raw.parse::<Decimal>() {
            return pct;
        }
    }

    debug!(codice, "unrecognized VAT code, defaulting to 0%");
    Decimal::ZERO
}
