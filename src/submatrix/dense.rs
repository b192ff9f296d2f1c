use nalgebra::DMatrix;

use super::{SubmatrixSource, SubmatrixView};
use crate::error::PivotError;
use crate::matrix::MaskedMatrix;

impl SubmatrixSource for MaskedMatrix {
    fn dim(&self) -> usize {
        MaskedMatrix::dim(self)
    }

    fn extract(&self, pivot: usize) -> Result<SubmatrixView, PivotError> {
        let n = MaskedMatrix::dim(self);
        if pivot >= n {
            return Err(PivotError::OutOfRange { pivot, dim: n });
        }

        let index_map = self.row_pattern(pivot);
        let m = index_map.len();
        // Fill-in inside the coupled block is picked up from the full matrix, masked
        // entries stay zero.
        let submatrix = DMatrix::from_fn(m, m, |j, k| {
            self.get(index_map[j], index_map[k]).unwrap_or(0.0)
        });

        SubmatrixView::new(pivot, index_map, submatrix)
    }
}
