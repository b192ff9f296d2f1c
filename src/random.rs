//! Seeded random test matrices, standing in for the `sprandsym` inputs the method is
//! usually benchmarked on.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, SubmatrixError};
use crate::matrix::MaskedMatrix;

/// Random structurally symmetric, strictly diagonally dominant (hence symmetric positive
/// definite) matrix.
///
/// Each off-diagonal pair `(i, j)`, `i < j`, is present with probability `density` and
/// drawn uniformly from `[-1, 1)`. The diagonal is the absolute row sum plus
/// `diagonal_shift`; smaller shifts give worse conditioned matrices.
pub fn random_sparse_spd(
    size: usize,
    density: f64,
    diagonal_shift: f64,
    seed: u64,
) -> Result<MaskedMatrix> {
    if !(0.0..=1.0).contains(&density) {
        return Err(SubmatrixError::InvalidArgument(format!(
            "density must lie in [0, 1], got {}",
            density
        )));
    }
    if !(diagonal_shift > 0.0) {
        return Err(SubmatrixError::InvalidArgument(format!(
            "diagonal shift must be positive, got {}",
            diagonal_shift
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values = Array2::<f64>::zeros((size, size));
    for i in 0..size {
        for j in (i + 1)..size {
            if rng.random_bool(density) {
                let value: f64 = rng.random_range(-1.0..1.0);
                values[[i, j]] = value;
                values[[j, i]] = value;
            }
        }
    }
    for i in 0..size {
        let off_diagonal: f64 = values.row(i).iter().map(|v| v.abs()).sum();
        values[[i, i]] = off_diagonal + diagonal_shift;
    }

    MaskedMatrix::from_dense(values)
}
