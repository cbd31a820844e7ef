//! Document numbering.
//!
//! Documents are numbered sequentially per calendar year as `YYYY/NNN`
//! (progressivo zero-padded to three digits). Documents created by
//! converting an accepted quote or pro-forma use the separate `FT N/YYYY`
//! sequence.
//!
//! The helpers here are pure: they scan an existing set of numbers and
//! produce the next one. Assignment must happen inside the insert
//! transaction (see the SQLite backend) so that two concurrent submissions
//! cannot draw the same number.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing a document number.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberError {
    #[error("malformed document number '{0}'")]
    Malformed(String),
}

/// A `YYYY/NNN` sequential number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub anno: i32,
    pub progressivo: u32,
}

impl DocumentNumber {
    pub fn new(anno: i32, progressivo: u32) -> Self {
        Self { anno, progressivo }
    }

    /// Parses `"2026/007"` (progressivo padding is not required on input).
    pub fn parse(s: &str) -> Result<Self, NumberError> {
        let (anno, progressivo) = s
            .split_once('/')
            .ok_or_else(|| NumberError::Malformed(s.to_string()))?;
        let anno: i32 = anno
            .trim()
            .parse()
            .map_err(|_| NumberError::Malformed(s.to_string()))?;
        let progressivo: u32 = progressivo
            .trim()
            .parse()
            .map_err(|_| NumberError::Malformed(s.to_string()))?;
        Ok(Self { anno, progressivo })
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:03}", self.anno, self.progressivo)
    }
}

/// An `FT N/YYYY` number assigned to invoices created by conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionNumber {
    pub anno: i32,
    pub progressivo: u32,
}

impl ConversionNumber {
    pub fn new(anno: i32, progressivo: u32) -> Self {
        Self { anno, progressivo }
    }

    /// Parses `"FT 3/2026"`.
    pub fn parse(s: &str) -> Result<Self, NumberError> {
        let rest = s
            .strip_prefix("FT ")
            .ok_or_else(|| NumberError::Malformed(s.to_string()))?;
        let (progressivo, anno) = rest
            .split_once('/')
            .ok_or_else(|| NumberError::Malformed(s.to_string()))?;
        let progressivo: u32 = progressivo
            .trim()
            .parse()
            .map_err(|_| NumberError::Malformed(s.to_string()))?;
        let anno: i32 = anno
            .trim()
            .parse()
            .map_err(|_| NumberError::Malformed(s.to_string()))?;
        Ok(Self { anno, progressivo })
    }
}

impl fmt::Display for ConversionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FT {}/{}", self.progressivo, self.anno)
    }
}

/// Next `YYYY/NNN` number for the year: highest existing progressivo plus
/// one, starting from 1. Numbers from other years or in other formats are
/// ignored.
pub fn next_in_year<'a, I>(existing: I, anno: i32) -> DocumentNumber
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|s| DocumentNumber::parse(s).ok())
        .filter(|n| n.anno == anno)
        .map(|n| n.progressivo)
        .max()
        .unwrap_or(0);
    DocumentNumber::new(anno, highest + 1)
}

/// Next `FT N/YYYY` number for the year, same scan-and-increment scheme.
pub fn next_conversion_in_year<'a, I>(existing: I, anno: i32) -> ConversionNumber
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|s| ConversionNumber::parse(s).ok())
        .filter(|n| n.anno == anno)
        .map(|n| n.progressivo)
        .max()
        .unwrap_or(0);
    ConversionNumber::new(anno, highest + 1)
}
