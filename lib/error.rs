//! Error type shared by every part of the crate.

use thiserror::Error;

/// Result alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the call that violates a contract.
///
/// None of these are retried internally; a caller driving a parameter search
/// is expected to move on to a different candidate.
#[derive(Debug, Error)]
pub enum Error {
    /// A truncation level too small to describe a physical mode.
    #[error("invalid truncation level {0}: need at least 2 levels")]
    InvalidDimension(usize),

    /// Bad register, time grid, or request parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Out-of-range or degenerate subsystem reference.
    #[error("term '{term}': invalid subsystem {subsystem} ({reason})")]
    InvalidSubsystem {
        term: String,
        subsystem: usize,
        reason: String,
    },

    /// A term (or waveform) name is already registered.
    #[error("name '{0}' is already registered")]
    DuplicateName(String),

    /// No control term (or waveform) is registered under this name.
    #[error("no control term or waveform named '{0}'")]
    UnknownTerm(String),

    /// Incompatible matrix or array shapes.
    #[error("{context}: expected dimension {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// A local operator attached to a drift or control term is not Hermitian.
    #[error("term '{0}': operator is not Hermitian")]
    NonHermitian(String),

    /// A propagator, integral, or score that failed its numerical sanity
    /// check.
    #[error("numerical instability in {context}: deviation {deviation:e}")]
    NumericalInstability {
        context: String,
        deviation: f64,
    },

    /// LAPACK failed to diagonalise a step Hamiltonian.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("npz write error: {0}")]
    Npz(#[from] ndarray_npy::WriteNpzError),
}

impl Error {
    pub(crate) fn subsystem<T, R>(term: T, subsystem: usize, reason: R) -> Self
    where
        T: Into<String>,
        R: Into<String>,
    {
        Self::InvalidSubsystem {
            term: term.into(),
            subsystem,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch<C>(context: C, expected: usize, found: usize)
        -> Self
    where C: Into<String>
    {
        Self::DimensionMismatch { context: context.into(), expected, found }
    }

    pub(crate) fn unstable<C>(context: C, deviation: f64) -> Self
    where C: Into<String>
    {
        Self::NumericalInstability { context: context.into(), deviation }
    }
}
