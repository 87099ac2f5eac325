//! Error types for the phased FIGS ensemble

use thiserror::Error;

/// Errors returned while fitting, extending or phasing an ensemble.
#[derive(Debug, Error)]
pub enum FigsError {
    /// A new phase carries data for a sample whose earlier phases are incomplete
    #[error("phase order violated: sample {sample} has missing earlier-phase data but a value in the new phase")]
    PhaseOrder { sample: usize },

    /// Array dimensions disagree
    #[error("shape mismatch: expected {expected} {what}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operation requires a fitted ensemble
    #[error("ensemble has not been fitted")]
    NotFitted,

    /// No rows to fit on
    #[error("dataset is empty")]
    EmptyDataset,

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset could not be parsed
    #[error("dataset error: {0}")]
    Dataset(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ensemble operations
pub type Result<T> = std::result::Result<T, FigsError>;
