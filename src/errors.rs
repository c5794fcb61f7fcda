//! Unified error types and result handling.
//!
//! Only [`SchemaError`] aborts a refresh cycle. [`ParseWarning`] and
//! [`PersistenceFault`] are absorbed with a fallback and reported alongside the
//! snapshot.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which raw input table a problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Per-item fundraising targets
    Targets,
    /// Donation log rows
    Donations,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Targets => f.write_str("targets"),
            Self::Donations => f.write_str("donations"),
        }
    }
}

/// Fatal normalization failures. No snapshot is produced for the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required canonical column could not be identified
    #[error("{table} table is missing required column `{field}`")]
    MissingField {
        /// Table that was being normalized
        table: TableKind,
        /// Canonical name of the missing field
        field: &'static str,
    },

    /// Two declared items fold to the same match key
    #[error("items `{first}` and `{second}` cannot be told apart after case folding")]
    DuplicateItem {
        /// Name that was declared first
        first: String,
        /// Conflicting name declared later
        second: String,
    },
}

/// What went wrong with a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseWarningKind {
    /// Timestamp text matched none of the accepted formats
    UnparseableTimestamp,
    /// Quantity cell was not a number; counted as 0
    UnparseableQuantity,
    /// Target cell was not a number; treated as 0
    UnparseableTarget,
    /// Target was below zero; clamped to 0
    NegativeTarget,
    /// Targets row without an item name; skipped
    BlankItemName,
}

/// Non-fatal, per-cell parse problem.
///
/// Carries positions only, never the cell text, so a warning can be shown to
/// the public without leaking anything typed into the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// Table the cell belongs to
    pub table: TableKind,
    /// Zero-based data row index
    pub row: usize,
    /// Canonical column name (or declared item name)
    pub column: String,
    /// Failure category
    pub kind: ParseWarningKind,
}

/// State store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    /// Opening the read-modify-write transaction
    Begin,
    /// Reading the stored `ChangeState`
    Load,
    /// Writing the updated `ChangeState`
    Save,
    /// Committing the transaction
    Commit,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Load => "load",
            Self::Save => "save",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// The change-state store could not be read or written.
#[derive(Debug, Error)]
#[error("state store {operation} failed: {source}")]
pub struct PersistenceFault {
    /// Operation that failed
    pub operation: StoreOperation,
    /// Underlying failure
    #[source]
    pub source: Error,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Input tables cannot be mapped onto the canonical schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration file missing or malformed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// A stored value could not be decoded
    #[error("Corrupt stored state: {message}")]
    CorruptState {
        /// Human-readable description
        message: String,
    },

    /// Database failure from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
