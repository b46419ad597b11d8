//! Error handling for taxsim
//!
//! Defines the typed, user-attributable validation failures raised by the
//! regime engine and establishes a unified Result type using anyhow for
//! context chaining and error propagation.

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation failures raised before any result row is written.
///
/// Engine functions return [`Result`]; callers that need to tell a
/// user mistake apart from a storage failure downcast with
/// `err.downcast_ref::<SimulationError>()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("trailing 12-month revenue must be positive to run a simulation")]
    MissingAggregate,

    #[error("{stream} apportionment sums to {apportioned} but declared revenue is {declared}")]
    ApportionmentMismatch {
        stream: String,
        declared: Decimal,
        apportioned: Decimal,
    },

    #[error("missing reference: {0}")]
    MissingAnnexReference(String),
}

/// Failures of the storage-backed collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    DbError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias used across the crate
pub type Result<T> = anyhow::Result<T>;
