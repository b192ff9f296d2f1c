use nalgebra_sparse::{CooMatrix, CscMatrix};
use ndarray::{Array2, ArrayView1, ArrayView2, Zip};

use crate::error::{Result, SubmatrixError};

/// A square dense matrix together with its sparsity mask.
///
/// `mask[[r, c]]` is `true` where the entry is treated as structurally zero. The mask is
/// fixed when the matrix is created and every consumer reads sparsity from it, never from
/// the stored value, so a computed value that happens to be tiny is not confused with a
/// missing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedMatrix {
    values: Array2<f64>,
    mask: Array2<bool>,
}

impl MaskedMatrix {
    /// Masks exactly the entries that are zero.
    pub fn from_dense(values: Array2<f64>) -> Result<Self> {
        Self::from_dense_threshold(values, 0.0)
    }

    /// Masks every entry with `|value| <= threshold`.
    pub fn from_dense_threshold(values: Array2<f64>, threshold: f64) -> Result<Self> {
        let mask = values.mapv(|v| v.abs() <= threshold);
        Self::from_parts(values, mask)
    }

    pub fn from_parts(values: Array2<f64>, mask: Array2<bool>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(SubmatrixError::NotSquare { rows, cols });
        }
        if mask.dim() != values.dim() {
            return Err(SubmatrixError::DimensionMismatch {
                expected: rows,
                found: mask.nrows().max(mask.ncols()),
            });
        }
        Ok(MaskedMatrix { values, mask })
    }

    /// Densifies a compressed sparse column matrix. Stored entries are unmasked even if
    /// their value is zero.
    pub fn from_csc(matrix: &CscMatrix<f64>) -> Result<Self> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(SubmatrixError::NotSquare {
                rows: n,
                cols: matrix.ncols(),
            });
        }
        let mut values = Array2::zeros((n, n));
        let mut mask = Array2::from_elem((n, n), true);
        for (row, col, &value) in matrix.triplet_iter() {
            values[[row, col]] = value;
            mask[[row, col]] = false;
        }
        Ok(MaskedMatrix { values, mask })
    }

    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn mask(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    pub fn mask_row(&self, row: usize) -> ArrayView1<'_, bool> {
        self.mask.row(row)
    }

    #[inline]
    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        self.mask[[row, col]]
    }

    /// Value of an unmasked entry, `None` for structural zeros.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if self.mask[[row, col]] {
            None
        } else {
            Some(self.values[[row, col]])
        }
    }

    /// Number of structurally nonzero entries.
    pub fn nnz(&self) -> usize {
        self.mask.iter().filter(|&&masked| !masked).count()
    }

    /// Dense copy with masked entries replaced by zero.
    pub fn filled(&self) -> Array2<f64> {
        let mut filled = Array2::zeros(self.values.raw_dim());
        Zip::from(&mut filled)
            .and(&self.values)
            .and(&self.mask)
            .for_each(|out, &value, &masked| {
                if !masked {
                    *out = value;
                }
            });
        filled
    }

    /// Ascending column indices of the unmasked entries in `row`.
    pub fn row_pattern(&self, row: usize) -> Vec<usize> {
        self.mask
            .row(row)
            .iter()
            .enumerate()
            .filter_map(|(col, &masked)| (!masked).then_some(col))
            .collect()
    }

    /// Compressed sparse column copy holding exactly the unmasked entries.
    pub fn to_csc(&self) -> CscMatrix<f64> {
        let n = self.dim();
        let mut coo = CooMatrix::new(n, n);
        for ((row, col), &value) in self.values.indexed_iter() {
            if !self.mask[[row, col]] {
                coo.push(row, col, value);
            }
        }
        CscMatrix::from(&coo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_matrix() -> MaskedMatrix {
        // [4 1 0]
        // [1 4 2]
        // [0 2 4]
        MaskedMatrix::from_dense(array![[4.0, 1.0, 0.0], [1.0, 4.0, 2.0], [0.0, 2.0, 4.0]])
            .unwrap()
    }

    #[test]
    fn test_mask_from_zero_test() {
        let matrix = create_test_matrix();
        assert!(matrix.is_masked(0, 2));
        assert!(matrix.is_masked(2, 0));
        assert!(!matrix.is_masked(1, 2));
        assert_eq!(matrix.nnz(), 7);
        assert_eq!(matrix.row_pattern(0), vec![0, 1]);
        assert_eq!(matrix.row_pattern(1), vec![0, 1, 2]);
        assert_eq!(matrix.get(0, 2), None);
        assert_eq!(matrix.get(1, 2), Some(2.0));
    }

    #[test]
    fn test_mask_from_threshold() {
        let values = array![[1.0, 1e-9], [-1e-9, 1.0]];
        let matrix = MaskedMatrix::from_dense_threshold(values, 1e-8).unwrap();
        assert_eq!(matrix.row_pattern(0), vec![0]);
        assert_eq!(matrix.row_pattern(1), vec![1]);

        let filled = matrix.filled();
        assert_eq!(filled, array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_not_square() {
        let result = MaskedMatrix::from_dense(Array2::zeros((2, 3)));
        assert!(matches!(
            result,
            Err(SubmatrixError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_csc_conversion_keeps_pattern() {
        let matrix = create_test_matrix();
        let csc = matrix.to_csc();
        assert_eq!(csc.nnz(), 7);
        assert_eq!(csc.col(0).row_indices(), &[0, 1]);

        let back = MaskedMatrix::from_csc(&csc).unwrap();
        assert_eq!(back, matrix);
    }
}
