//! Error taxonomy for the submatrix method.
//!
//! Errors are split by how far they reach. [`SolveError`] describes why a single dense
//! submatrix could not be raised to the requested power, [`PivotError`] ties such a
//! failure (or a structural problem) to the pivot that produced it, and [`SubmatrixError`]
//! is what the public entry points return.
use nalgebra_sparse::{SparseFormatError, SparseFormatErrorKind};
use thiserror::Error;

/// Failure of the dense solve on one extracted submatrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The submatrix has no numerically meaningful inverse.
    #[error("submatrix of dimension {dim} is numerically singular")]
    Singular { dim: usize },

    /// Fractional powers are taken through a symmetric eigendecomposition.
    #[error("a fractional power requires a symmetric submatrix")]
    NotSymmetric,

    /// A negative eigenvalue has no real non-integer power.
    #[error("eigenvalue {eigenvalue} has no real power {exponent}")]
    Indefinite { eigenvalue: f64, exponent: f64 },
}

/// Failure local to one pivot. Sibling pivots are never affected by it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    #[error("pivot {pivot} is out of range for a {dim}x{dim} matrix")]
    OutOfRange { pivot: usize, dim: usize },

    /// The pivot row has no stored entry in its own column (zero diagonal).
    #[error("pivot {pivot} has no structural entry on the diagonal")]
    SelfEntryMissing { pivot: usize },

    #[error("pivot {pivot}: {source}")]
    Solve {
        pivot: usize,
        #[source]
        source: SolveError,
    },
}

impl PivotError {
    pub fn pivot(&self) -> usize {
        match self {
            PivotError::OutOfRange { pivot, .. }
            | PivotError::SelfEntryMissing { pivot }
            | PivotError::Solve { pivot, .. } => *pivot,
        }
    }
}

/// Errors returned by the crate's public entry points.
#[derive(Error, Debug)]
pub enum SubmatrixError {
    /// A loaded matrix violates structural expectations.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("exponent {0} is not supported by this operation")]
    UnsupportedExponent(f64),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Pivot(#[from] PivotError),

    /// Raised by [`FailurePolicy::Abort`](crate::FailurePolicy::Abort) once every pivot has run.
    #[error("{} of {total} pivots failed, first failure: {}", .failures.len(), first_failure(.failures))]
    Build {
        failures: Vec<PivotError>,
        total: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sparse format error ({kind:?}): {message}")]
    SparseFormat {
        kind: SparseFormatErrorKind,
        message: String,
    },

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn first_failure(failures: &[PivotError]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

// The wrapped error of `SparseFormatError` is not `Send`, so only its kind and message are kept.
impl From<SparseFormatError> for SubmatrixError {
    fn from(error: SparseFormatError) -> Self {
        SubmatrixError::SparseFormat {
            kind: *error.kind(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SubmatrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_error_message() {
        let error = SolveError::Singular { dim: 3 };
        assert_eq!(
            error.to_string(),
            "submatrix of dimension 3 is numerically singular"
        );
    }

    #[test]
    fn test_pivot_error_wraps_solve_error() {
        let error = PivotError::Solve {
            pivot: 7,
            source: SolveError::Singular { dim: 2 },
        };
        assert_eq!(
            error.to_string(),
            "pivot 7: submatrix of dimension 2 is numerically singular"
        );
        assert_eq!(error.pivot(), 7);
    }

    #[test]
    fn test_build_error_message() {
        let error = SubmatrixError::Build {
            failures: vec![
                PivotError::SelfEntryMissing { pivot: 1 },
                PivotError::SelfEntryMissing { pivot: 4 },
            ],
            total: 10,
        };
        assert_eq!(
            error.to_string(),
            "2 of 10 pivots failed, first failure: pivot 1 has no structural entry on the diagonal"
        );
    }
}
