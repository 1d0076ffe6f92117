//! Error types for LedgerSift
//!
//! Only hard failures live here. Soft outcomes — a statistical check that
//! lacks samples, a rule condition with an unparseable regex — are skip
//! results inside the detectors, logged and absorbed, never errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External source failure: {0}")]
    External(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
