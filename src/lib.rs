//! Approximate inverses and inverse roots of sparse symmetric matrices by the submatrix
//! method.
//!
//! Column `p` of the result is taken from the dense solve of the small block selected by
//! the nonzero pattern of row `p`. All pivots are independent and run in parallel.
//!
//! ```no_run
//! use submatrix_method::{random_sparse_spd, Exponent, SubmatrixInverseBuilder};
//!
//! let matrix = random_sparse_spd(500, 0.01, 1.0, 42)?;
//! let engine = SubmatrixInverseBuilder::new()
//!     .exponent(Exponent::InverseSqrt)
//!     .num_threads(8)
//!     .build()?;
//! let approx = engine.build(&matrix)?;
//! println!("{} pivots failed", approx.failures().len());
//! # Ok::<(), submatrix_method::SubmatrixError>(())
//! ```

pub mod engine;
pub mod error;
pub mod io;
pub mod matrix;
pub mod metrics;
pub mod random;
pub mod solver;
pub mod submatrix;

pub use engine::{
    ApproxInverse, BuildTimings, FailurePolicy, SparseApproxInverse, SubmatrixInverse,
    SubmatrixInverseBuilder,
};
pub use error::{PivotError, SolveError, SubmatrixError};
pub use matrix::MaskedMatrix;
pub use random::random_sparse_spd;
pub use solver::{invert_dense, power_dense, Exponent};
pub use submatrix::{scatter, scatter_column, SubmatrixSource, SubmatrixView};
