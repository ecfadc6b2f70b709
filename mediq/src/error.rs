//! Typed errors for the quality core and the batch pipeline.
//!
//! The orchestration layers (`batch_pipeline`, `main`) work in `anyhow::Result`
//! and add context; these variants are what callers match on when they need to
//! distinguish a skippable decode failure from a missing input file.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediqError>;

#[derive(Debug, Error)]
pub enum MediqError {
    /// Input could not be turned into a grayscale pixel grid
    #[error("failed to decode {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    /// An expected input file does not exist
    #[error("input not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// Metadata table is malformed (missing columns, bad header)
    #[error("invalid metadata table {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl MediqError {
    pub fn decode(source_name: impl Into<String>, reason: impl ToString) -> Self {
        MediqError::Decode {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Decode failures are non-fatal in batch mode
    pub fn is_skippable(&self) -> bool {
        matches!(self, MediqError::Decode { .. })
    }
}
