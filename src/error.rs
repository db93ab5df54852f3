//! Error types for brentsat.
//!
//! Each concern gets its own enum. Invariant violations after a mutation are
//! not represented here: those are programming errors and panic.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ring::{Coeff, Ring};

/// Errors raised while building or transforming a [`crate::scheme::Scheme`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemeError {
    /// U, V and W disagree on the number of rows
    #[error("row count mismatch: u has {u}, v has {v}, w has {w}")]
    RowCount { u: usize, v: usize, w: usize },

    /// A row has the wrong number of columns for the given dimensions
    #[error("{matrix} row {row} has {got} entries, expected {expected}")]
    RowLength {
        matrix: char,
        row: usize,
        got: usize,
        expected: usize,
    },

    /// An entry is not an element of the scheme's ring
    #[error("{matrix}[{row}][{column}] = {value} is not an element of {ring}")]
    OutsideRing {
        matrix: char,
        row: usize,
        column: usize,
        value: Coeff,
        ring: Ring,
    },

    /// The Brent equation for (i, j, k) does not hold
    #[error("brent equation ({i}, {j}, {k}) violated")]
    BrentViolation { i: usize, j: usize, k: usize },

    /// Operation needs a square (or otherwise shape-compatible) scheme
    #[error("operation requires {0}")]
    Shape(&'static str),

    /// A basis change matrix has no inverse over the ring
    #[error("{0} matrix is not invertible over the ring")]
    NotInvertible(char),

    /// Operation is not defined for this ring
    #[error("operation is not allowed over {0}")]
    RingUnsupported(Ring),

    /// A rational entry cannot be reduced modulo 2
    #[error("entry {0} is not an integer")]
    NotIntegral(Coeff),

    /// Row scaling factors must multiply to one
    #[error("scaling factors must multiply to 1, got {0}")]
    BadScaling(Coeff),

    /// Index outside the scheme
    #[error("index {index} out of range 0..{bound}")]
    OutOfRange { index: usize, bound: usize },

    /// Bit-packed rows hold at most 128 coefficients
    #[error("factor with {0} coefficients does not fit a 128-bit mask")]
    TooWide(usize),
}

/// Errors raised while reading or writing persisted scheme records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Scheme(#[from] SchemeError),
}

/// Errors raised while invoking the external SAT solver.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to start solver `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write instance {path}: {source}")]
    Instance {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors raised by the text formats (bit-packed schemes).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input, expected {0}")]
    Eof(&'static str),

    #[error("invalid number `{0}`")]
    Number(String),

    #[error("expected {expected} values, found {found}")]
    Count { expected: usize, found: usize },

    #[error(transparent)]
    Scheme(#[from] SchemeError),
}
