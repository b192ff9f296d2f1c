//! Parallel assembly of the approximate inverse (or inverse root).
//!
//! Every pivot is an independent task: extract its submatrix, solve it, and write one
//! column of the result. Each task owns exactly one column of the preallocated output,
//! handed out through a parallel iterator over the columns, so no locking is involved.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;
use ndarray::{Array2, Axis, ShapeBuilder};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{PivotError, Result, SubmatrixError};
use crate::solver::{solve, Exponent};
use crate::submatrix::{scatter_column, SubmatrixSource, SubmatrixView};

/// What to do once a pivot fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Every pivot still runs, then the build returns [`SubmatrixError::Build`].
    #[default]
    Abort,
    /// Failed pivots leave a zero column and are reported alongside the result.
    ZeroColumn,
}

pub struct SubmatrixInverseBuilder {
    exponent: Exponent,
    num_threads: Option<usize>,
    solver_threads: usize,
    failure_policy: FailurePolicy,
}

impl Default for SubmatrixInverseBuilder {
    fn default() -> Self {
        Self {
            exponent: Exponent::Inverse,
            num_threads: None,
            solver_threads: 1,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl SubmatrixInverseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exponent(mut self, exponent: impl Into<Exponent>) -> Self {
        self.exponent = exponent.into();
        self
    }

    /// Total number of threads the build may occupy. Defaults to all available cores.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Threads the dense solve itself uses internally (a multi-threaded BLAS/LAPACK).
    /// Pivot-level parallelism is reduced by this factor.
    pub fn solver_threads(mut self, solver_threads: usize) -> Self {
        self.solver_threads = solver_threads;
        self
    }

    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn build(self) -> Result<SubmatrixInverse> {
        let available = self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pivot_threads = (available / self.solver_threads.max(1)).max(1);
        debug!(
            "{} thread(s) available, {} for pivots, {} per dense solve",
            available, pivot_threads, self.solver_threads
        );

        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(pivot_threads)
            .build()?;

        Ok(SubmatrixInverse {
            exponent: self.exponent,
            failure_policy: self.failure_policy,
            pivot_threads,
            thread_pool,
        })
    }
}

/// Accumulated timings of one build.
///
/// `extract` and `solve` are summed over all pivots and therefore exceed `wall` when
/// pivots run in parallel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildTimings {
    pub wall: Duration,
    pub extract: Duration,
    pub solve: Duration,
}

/// Dense approximate inverse together with the pivots that failed under
/// [`FailurePolicy::ZeroColumn`].
#[derive(Debug, Clone)]
pub struct ApproxInverse {
    matrix: Array2<f64>,
    failures: Vec<PivotError>,
    timings: BuildTimings,
}

impl ApproxInverse {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn into_matrix(self) -> Array2<f64> {
        self.matrix
    }

    pub fn failures(&self) -> &[PivotError] {
        &self.failures
    }

    pub fn timings(&self) -> BuildTimings {
        self.timings
    }
}

/// Approximate inverse sharing the sparsity pattern of a compressed sparse column input.
#[derive(Debug, Clone)]
pub struct SparseApproxInverse {
    matrix: CscMatrix<f64>,
    failures: Vec<PivotError>,
    timings: BuildTimings,
}

impl SparseApproxInverse {
    pub fn matrix(&self) -> &CscMatrix<f64> {
        &self.matrix
    }

    pub fn into_matrix(self) -> CscMatrix<f64> {
        self.matrix
    }

    pub fn failures(&self) -> &[PivotError] {
        &self.failures
    }

    pub fn timings(&self) -> BuildTimings {
        self.timings
    }
}

struct PivotOutcome {
    solved: std::result::Result<(SubmatrixView, DMatrix<f64>), PivotError>,
    extract: Duration,
    solve: Duration,
}

pub struct SubmatrixInverse {
    exponent: Exponent,
    failure_policy: FailurePolicy,
    pivot_threads: usize,
    thread_pool: ThreadPool,
}

impl SubmatrixInverse {
    pub fn exponent(&self) -> Exponent {
        self.exponent
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn pivot_threads(&self) -> usize {
        self.pivot_threads
    }

    fn solve_pivot<S>(&self, source: &S, pivot: usize) -> PivotOutcome
    where
        S: SubmatrixSource + ?Sized,
    {
        let start = Instant::now();
        let view = match source.extract(pivot) {
            Ok(view) => view,
            Err(err) => {
                return PivotOutcome {
                    solved: Err(err),
                    extract: start.elapsed(),
                    solve: Duration::ZERO,
                };
            }
        };
        let extract = start.elapsed();

        let start = Instant::now();
        let solved = solve(view.matrix().clone(), self.exponent)
            .map(|solved| (view, solved))
            .map_err(|source| PivotError::Solve { pivot, source });

        PivotOutcome {
            solved,
            extract,
            solve: start.elapsed(),
        }
    }

    /// Builds the dense approximation of `source^exponent`, column `p` coming from the
    /// submatrix of pivot `p`.
    pub fn build<S>(&self, source: &S) -> Result<ApproxInverse>
    where
        S: SubmatrixSource + ?Sized,
    {
        let n = source.dim();
        info!(
            "building approximate power {} of a {}x{} matrix on {} thread(s)",
            self.exponent, n, n, self.pivot_threads
        );
        let start = Instant::now();

        // column-major so that every task writes a contiguous column
        let mut matrix = Array2::<f64>::zeros((n, n).f());
        let outcomes: Vec<PivotOutcome> = self.thread_pool.install(|| {
            matrix
                .axis_iter_mut(Axis(1))
                .into_par_iter()
                .enumerate()
                .map(|(pivot, column)| {
                    let outcome = self.solve_pivot(source, pivot);
                    if let Ok((view, solved)) = &outcome.solved {
                        scatter_column(column, solved, view);
                    }
                    outcome
                })
                .collect()
        });

        let (failures, timings) = self.collect(outcomes, start)?;
        Ok(ApproxInverse {
            matrix,
            failures,
            timings,
        })
    }

    /// Sparse variant of [`Self::build`] for compressed sparse column input.
    ///
    /// The neighbourhood of pivot `p` is the row pattern of column `p`, so the scattered
    /// column occupies exactly the input's pattern and the result reuses it.
    pub fn build_csc(&self, matrix: &CscMatrix<f64>) -> Result<SparseApproxInverse> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        if rows != cols {
            return Err(SubmatrixError::NotSquare { rows, cols });
        }
        info!(
            "building approximate power {} of a {}x{} sparse matrix ({} nonzeros) on {} thread(s)",
            self.exponent,
            rows,
            cols,
            matrix.nnz(),
            self.pivot_threads
        );
        let start = Instant::now();

        let (columns, outcomes): (Vec<Vec<f64>>, Vec<PivotOutcome>) =
            self.thread_pool.install(|| {
                (0..cols)
                    .into_par_iter()
                    .map(|pivot| {
                        let outcome = self.solve_pivot(matrix, pivot);
                        let column = match &outcome.solved {
                            Ok((view, solved)) => {
                                solved.column(view.local_pivot()).iter().copied().collect()
                            }
                            Err(_) => vec![0.0; matrix.col(pivot).nnz()],
                        };
                        (column, outcome)
                    })
                    .unzip()
            });

        let (failures, timings) = self.collect(outcomes, start)?;
        let values: Vec<f64> = columns.into_iter().flatten().collect();
        let inverse = CscMatrix::try_from_pattern_and_values(matrix.pattern().clone(), values)?;
        Ok(SparseApproxInverse {
            matrix: inverse,
            failures,
            timings,
        })
    }

    fn collect(
        &self,
        outcomes: Vec<PivotOutcome>,
        start: Instant,
    ) -> Result<(Vec<PivotError>, BuildTimings)> {
        let total = outcomes.len();
        let mut timings = BuildTimings::default();
        let mut failures = Vec::new();
        for outcome in outcomes {
            timings.extract += outcome.extract;
            timings.solve += outcome.solve;
            if let Err(failure) = outcome.solved {
                warn!("{}", failure);
                failures.push(failure);
            }
        }
        timings.wall = start.elapsed();

        info!(
            "{} pivots in {}ms wall, {}ms extracting, {}ms solving, {} failed",
            total,
            timings.wall.as_millis(),
            timings.extract.as_millis(),
            timings.solve.as_millis(),
            failures.len()
        );

        if self.failure_policy == FailurePolicy::Abort && !failures.is_empty() {
            return Err(SubmatrixError::Build { failures, total });
        }
        Ok((failures, timings))
    }
}
