use nalgebra::DMatrix;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

use super::{SubmatrixSource, SubmatrixView};
use crate::error::PivotError;

// For compressed storage the pivot's neighbourhood is read from its own lane (a column
// for CSC, a row for CSR). Entries of the block are located by binary search in the
// sorted minor indices of the lane they live in.

impl SubmatrixSource for CscMatrix<f64> {
    fn dim(&self) -> usize {
        self.ncols()
    }

    fn extract(&self, pivot: usize) -> Result<SubmatrixView, PivotError> {
        let n = self.ncols();
        if pivot >= n {
            return Err(PivotError::OutOfRange { pivot, dim: n });
        }

        let index_map = self.col(pivot).row_indices().to_vec();
        let m = index_map.len();
        let mut submatrix = DMatrix::zeros(m, m);
        for (l, &col) in index_map.iter().enumerate() {
            let lane = self.col(col);
            let (rows, values) = (lane.row_indices(), lane.values());
            for (k, row) in index_map.iter().enumerate() {
                if let Ok(idx) = rows.binary_search(row) {
                    submatrix[(k, l)] = values[idx];
                }
            }
        }

        SubmatrixView::new(pivot, index_map, submatrix)
    }
}

impl SubmatrixSource for CsrMatrix<f64> {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn extract(&self, pivot: usize) -> Result<SubmatrixView, PivotError> {
        let n = self.nrows();
        if pivot >= n {
            return Err(PivotError::OutOfRange { pivot, dim: n });
        }

        let index_map = self.row(pivot).col_indices().to_vec();
        let m = index_map.len();
        let mut submatrix = DMatrix::zeros(m, m);
        for (k, &row) in index_map.iter().enumerate() {
            let lane = self.row(row);
            let (cols, values) = (lane.col_indices(), lane.values());
            for (l, col) in index_map.iter().enumerate() {
                if let Ok(idx) = cols.binary_search(col) {
                    submatrix[(k, l)] = values[idx];
                }
            }
        }

        SubmatrixView::new(pivot, index_map, submatrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MaskedMatrix;
    use nalgebra_sparse::CooMatrix;
    use ndarray::array;

    fn create_test_matrix() -> MaskedMatrix {
        // [5 1 0 2 0]
        // [1 5 1 0 0]
        // [0 1 5 1 0]
        // [2 0 1 5 1]
        // [0 0 0 1 5]
        MaskedMatrix::from_dense(array![
            [5.0, 1.0, 0.0, 2.0, 0.0],
            [1.0, 5.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 5.0, 1.0, 0.0],
            [2.0, 0.0, 1.0, 5.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 5.0]
        ])
        .unwrap()
    }

    #[test]
    fn test_csc_matches_dense_extraction() {
        let dense = create_test_matrix();
        let csc = dense.to_csc();
        for pivot in 0..5 {
            assert_eq!(csc.extract(pivot).unwrap(), dense.extract(pivot).unwrap());
        }
    }

    #[test]
    fn test_csr_matches_dense_extraction() {
        let dense = create_test_matrix();
        let csr = CsrMatrix::from(&dense.to_csc());
        for pivot in 0..5 {
            assert_eq!(csr.extract(pivot).unwrap(), dense.extract(pivot).unwrap());
        }
    }

    #[test]
    fn test_csc_missing_diagonal() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(1, 0, 1.0);
        coo.push(0, 1, 1.0);
        let csc = CscMatrix::from(&coo);

        assert!(csc.extract(0).is_ok());
        assert_eq!(
            csc.extract(1),
            Err(PivotError::SelfEntryMissing { pivot: 1 })
        );
        assert_eq!(
            csc.extract(2),
            Err(PivotError::OutOfRange { pivot: 2, dim: 2 })
        );
    }
}
