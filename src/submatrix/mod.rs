//! Extraction of pivot submatrices and scattering of solved columns.
//!
//! For a pivot `p` the submatrix is the dense block of the global matrix at the cross
//! product of the nonzero columns of row `p`. Once the block has been solved only the
//! column belonging to `p` is written back, into column `p` of the global result.

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayViewMut1};

use crate::error::PivotError;

mod dense;
mod sparse;

/// A dense submatrix together with the global index of each of its rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmatrixView {
    pivot: usize,
    index_map: Vec<usize>,
    local_pivot: usize,
    matrix: DMatrix<f64>,
}

impl SubmatrixView {
    /// `index_map` must be strictly ascending and `matrix` must be `m x m` with
    /// `m = index_map.len()`.
    pub fn new(
        pivot: usize,
        index_map: Vec<usize>,
        matrix: DMatrix<f64>,
    ) -> Result<Self, PivotError> {
        debug_assert!(index_map.windows(2).all(|w| w[0] < w[1]));
        debug_assert_eq!(matrix.shape(), (index_map.len(), index_map.len()));

        let local_pivot = index_map
            .binary_search(&pivot)
            .map_err(|_| PivotError::SelfEntryMissing { pivot })?;
        Ok(SubmatrixView {
            pivot,
            index_map,
            local_pivot,
            matrix,
        })
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn index_map(&self) -> &[usize] {
        &self.index_map
    }

    /// Position of the pivot inside [`Self::index_map`].
    pub fn local_pivot(&self) -> usize {
        self.local_pivot
    }

    pub fn dim(&self) -> usize {
        self.index_map.len()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn into_matrix(self) -> DMatrix<f64> {
        self.matrix
    }
}

/// Anything a pivot submatrix can be cut out of.
///
/// Implementations must return the unmasked positions of the pivot's row (or, for
/// column-compressed storage of a structurally symmetric matrix, its column) in ascending
/// order and fill every position of the block that is itself structurally nonzero.
pub trait SubmatrixSource: Sync {
    fn dim(&self) -> usize;

    fn extract(&self, pivot: usize) -> Result<SubmatrixView, PivotError>;
}

/// Writes column `view.local_pivot()` of `solved` into `column`, which must be column
/// `view.pivot()` of the global result. Rows outside the pivot's index map are zeroed.
pub fn scatter_column(
    mut column: ArrayViewMut1<'_, f64>,
    solved: &DMatrix<f64>,
    view: &SubmatrixView,
) {
    debug_assert_eq!(solved.shape(), (view.dim(), view.dim()));

    column.fill(0.0);
    let source = solved.column(view.local_pivot());
    for (local, &global) in view.index_map().iter().enumerate() {
        column[global] = source[local];
    }
}

/// Writes the solved pivot column into column `view.pivot()` of `result`.
pub fn scatter(result: &mut Array2<f64>, solved: &DMatrix<f64>, view: &SubmatrixView) {
    scatter_column(result.column_mut(view.pivot()), solved, view);
}
