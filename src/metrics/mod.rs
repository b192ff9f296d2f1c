//! # Quality Metrics
//!
//! Diagnostics over finished matrices: structural density, exact symmetry, positive
//! definiteness, 2-norm condition number, spectral radius, residuals of an approximate
//! inverse (root) and relative errors of derived scalars. None of these functions modify
//! their inputs.
//!
//! The relative error keeps the sign convention `-|approx - exact| / exact`, so a
//! deviation is reported as a non-positive number for positive reference values.

use std::fmt;

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use nshare::IntoNalgebra;

use crate::error::{Result, SubmatrixError};
use crate::matrix::MaskedMatrix;
use crate::solver::Exponent;

pub mod energy;

fn ensure_square(matrix: &ArrayView2<'_, f64>) -> Result<usize> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(SubmatrixError::NotSquare { rows, cols });
    }
    Ok(rows)
}

fn ensure_same_shape(a: &ArrayView2<'_, f64>, b: &ArrayView2<'_, f64>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(SubmatrixError::DimensionMismatch {
            expected: a.nrows(),
            found: b.nrows(),
        });
    }
    Ok(())
}

fn to_nalgebra(matrix: ArrayView2<'_, f64>) -> DMatrix<f64> {
    matrix.into_nalgebra().clone_owned()
}

/// Fraction of structurally nonzero entries.
pub fn density(matrix: &MaskedMatrix) -> f64 {
    let n = matrix.dim();
    if n == 0 {
        return 0.0;
    }
    matrix.nnz() as f64 / (n * n) as f64
}

/// Fraction of nonzero entries of a plain dense matrix.
pub fn dense_density(matrix: ArrayView2<'_, f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    let nonzero = matrix.iter().filter(|&&v| v != 0.0).count();
    nonzero as f64 / matrix.len() as f64
}

/// `M == Mᵀ`, compared exactly.
pub fn is_symmetric(matrix: ArrayView2<'_, f64>) -> bool {
    matrix.is_square() && matrix == matrix.t()
}

/// Real eigenvalues for symmetric input, moduli and real parts otherwise.
fn eigenvalues(matrix: ArrayView2<'_, f64>) -> Vec<(f64, f64)> {
    let m = to_nalgebra(matrix);
    if is_symmetric(matrix) {
        m.symmetric_eigenvalues().iter().map(|&l| (l, 0.0)).collect()
    } else {
        m.complex_eigenvalues()
            .iter()
            .map(|z| (z.re, z.im))
            .collect()
    }
}

/// All eigenvalues real and strictly positive.
pub fn is_positive_definite(matrix: ArrayView2<'_, f64>) -> Result<bool> {
    ensure_square(&matrix)?;
    Ok(eigenvalues(matrix)
        .iter()
        .all(|&(re, im)| im == 0.0 && re > 0.0))
}

/// Largest absolute eigenvalue.
pub fn spectral_radius(matrix: ArrayView2<'_, f64>) -> Result<f64> {
    ensure_square(&matrix)?;
    Ok(eigenvalues(matrix)
        .iter()
        .map(|&(re, im)| re.hypot(im))
        .fold(0.0, f64::max))
}

/// Largest singular value.
pub fn spectral_norm(matrix: ArrayView2<'_, f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    to_nalgebra(matrix).singular_values().max()
}

/// Ratio of the largest to the smallest singular value, infinite for singular input.
pub fn condition_number(matrix: ArrayView2<'_, f64>) -> Result<f64> {
    ensure_square(&matrix)?;
    if matrix.is_empty() {
        return Ok(0.0);
    }
    let singular_values = to_nalgebra(matrix).singular_values();
    let smallest = singular_values.min();
    if smallest == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(singular_values.max() / smallest)
}

/// `‖Xᵏ·A − I‖₂` for an approximation `X` of `A^(-1/k)`.
///
/// Only exponents of the form `-1/k` with a positive integer `k` have such a residual.
pub fn identity_residual(
    approx: ArrayView2<'_, f64>,
    matrix: ArrayView2<'_, f64>,
    exponent: Exponent,
) -> Result<f64> {
    let n = ensure_square(&matrix)?;
    ensure_same_shape(&matrix, &approx)?;
    let order = exponent
        .root_order()
        .ok_or(SubmatrixError::UnsupportedExponent(exponent.value()))?;

    let mut product = approx.to_owned();
    for _ in 1..order {
        product = product.dot(&approx);
    }
    let residual = product.dot(&matrix) - Array2::<f64>::eye(n);
    Ok(spectral_norm(residual.view()))
}

/// `‖approx − exact‖_F / ‖exact‖_F`.
pub fn relative_residual(approx: ArrayView2<'_, f64>, exact: ArrayView2<'_, f64>) -> Result<f64> {
    ensure_same_shape(&exact, &approx)?;
    let difference = (&approx - &exact).iter().map(|v| v * v).sum::<f64>().sqrt();
    let reference = exact.iter().map(|v| v * v).sum::<f64>().sqrt();
    Ok(difference / reference)
}

/// Trace of the product of `factors`, multiplied left to right.
pub fn trace_of_product(factors: &[ArrayView2<'_, f64>]) -> Result<f64> {
    let (last, rest) = match factors.split_last() {
        Some(split) => split,
        None => {
            return Err(SubmatrixError::InvalidArgument(
                "trace of an empty product".to_string(),
            ))
        }
    };
    let mut product: Option<Array2<f64>> = None;
    for factor in rest {
        product = Some(match product {
            None => factor.to_owned(),
            Some(acc) => {
                if acc.ncols() != factor.nrows() {
                    return Err(SubmatrixError::DimensionMismatch {
                        expected: acc.ncols(),
                        found: factor.nrows(),
                    });
                }
                acc.dot(factor)
            }
        });
    }

    let head = product.unwrap_or_else(|| Array2::eye(last.nrows()));
    if head.ncols() != last.nrows() || head.nrows() != last.ncols() {
        return Err(SubmatrixError::DimensionMismatch {
            expected: head.ncols(),
            found: last.nrows(),
        });
    }
    // only the diagonal of the final product is needed
    Ok((0..head.nrows())
        .map(|i| head.row(i).dot(&last.column(i)))
        .sum())
}

/// `-|approx − exact| / exact`.
pub fn relative_error(approx: f64, exact: f64) -> f64 {
    -(approx - exact).abs() / exact
}

/// Summary of a matrix as printed before an approximation run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixInfo {
    pub dim: usize,
    pub density: f64,
    pub positive_definite: bool,
    pub symmetric: bool,
    pub condition_number: f64,
    pub spectral_radius: f64,
}

impl MatrixInfo {
    pub fn of(matrix: &MaskedMatrix) -> Result<Self> {
        let filled = matrix.filled();
        let view = filled.view();
        Ok(MatrixInfo {
            dim: matrix.dim(),
            density: density(matrix),
            positive_definite: is_positive_definite(view)?,
            symmetric: is_symmetric(view),
            condition_number: condition_number(view)?,
            spectral_radius: spectral_radius(view)?,
        })
    }
}

impl fmt::Display for MatrixInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "* {}x{} Matrix", self.dim, self.dim)?;
        writeln!(f, "* Density: {}", self.density)?;
        if self.positive_definite {
            writeln!(f, "* Matrix is positive definite")?;
        }
        if self.symmetric {
            writeln!(f, "* Matrix is symmetric")?;
        }
        writeln!(f, "* Condition number: {}", self.condition_number)?;
        write!(f, "* Spectral radius: {}", self.spectral_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    #[test]
    fn test_density() {
        let matrix =
            MaskedMatrix::from_dense(array![[4.0, 1.0, 0.0], [1.0, 4.0, 2.0], [0.0, 2.0, 4.0]])
                .unwrap();
        assert_relative_eq!(density(&matrix), 7.0 / 9.0);
        assert_relative_eq!(dense_density(matrix.filled().view()), 7.0 / 9.0);
    }

    #[test]
    fn test_symmetry_is_exact() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(is_symmetric(a.view()));
        let b = array![[1.0, 2.0], [2.0 + 1e-15, 1.0]];
        assert!(!is_symmetric(b.view()));
        let c = Array2::<f64>::zeros((2, 3));
        assert!(!is_symmetric(c.view()));
    }

    #[test]
    fn test_spectral_quantities() {
        let a = array![[2.0, 0.0], [0.0, -5.0]];
        assert!(!is_positive_definite(a.view()).unwrap());
        assert_relative_eq!(spectral_radius(a.view()).unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(condition_number(a.view()).unwrap(), 2.5, epsilon = 1e-12);

        let spd = array![[2.0, 1.0], [1.0, 2.0]];
        assert!(is_positive_definite(spd.view()).unwrap());
        assert_relative_eq!(spectral_radius(spd.view()).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(condition_number(spd.view()).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spectral_radius_of_rotation() {
        // eigenvalues ±2i
        let a = array![[0.0, -2.0], [2.0, 0.0]];
        assert_relative_eq!(spectral_radius(a.view()).unwrap(), 2.0, epsilon = 1e-12);
        assert!(!is_positive_definite(a.view()).unwrap());
    }

    #[test]
    fn test_condition_number_of_singular_matrix() {
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        assert_eq!(condition_number(a.view()).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_identity_residual() {
        let a = array![[4.0, 0.0], [0.0, 9.0]];
        let inverse = array![[0.25, 0.0], [0.0, 1.0 / 9.0]];
        let root = array![[0.5, 0.0], [0.0, 1.0 / 3.0]];
        assert_abs_diff_eq!(
            identity_residual(inverse.view(), a.view(), Exponent::Inverse).unwrap(),
            0.0,
            epsilon = 1e-15
        );
        assert_abs_diff_eq!(
            identity_residual(root.view(), a.view(), Exponent::InverseSqrt).unwrap(),
            0.0,
            epsilon = 1e-15
        );
        // X = I leaves A - I
        let identity = Array2::<f64>::eye(2);
        assert_relative_eq!(
            identity_residual(identity.view(), a.view(), Exponent::Inverse).unwrap(),
            8.0,
            epsilon = 1e-12
        );
        assert!(matches!(
            identity_residual(identity.view(), a.view(), Exponent::Real(0.5)),
            Err(SubmatrixError::UnsupportedExponent(_))
        ));
    }

    #[test]
    fn test_relative_residual() {
        let exact = array![[3.0, 0.0], [0.0, 4.0]];
        let approx = array![[3.0, 0.0], [0.0, 0.0]];
        assert_relative_eq!(relative_residual(approx.view(), exact.view()).unwrap(), 0.8);
    }

    #[test]
    fn test_trace_of_product() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[0.0, 1.0], [1.0, 0.0]];
        // a.b = [[2, 1], [4, 3]]
        assert_relative_eq!(trace_of_product(&[a.view(), b.view()]).unwrap(), 5.0);
        // a.b.a = [[5, 8], [13, 20]]
        assert_relative_eq!(
            trace_of_product(&[a.view(), b.view(), a.view()]).unwrap(),
            25.0
        );
        assert_relative_eq!(trace_of_product(&[a.view()]).unwrap(), 5.0);
        assert!(trace_of_product(&[]).is_err());

        let c = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            trace_of_product(&[a.view(), c.view()]),
            Err(SubmatrixError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_relative_error_sign_convention() {
        assert_relative_eq!(relative_error(9.0, 10.0), -0.1);
        assert_relative_eq!(relative_error(11.0, 10.0), -0.1);
        assert_eq!(relative_error(10.0, 10.0), 0.0);
        // a negative reference flips the sign, as in the reported numbers
        assert_relative_eq!(relative_error(-9.0, -10.0), 0.1);
    }

    #[test]
    fn test_matrix_info_report() {
        let matrix = MaskedMatrix::from_dense(array![[2.0, 1.0], [1.0, 2.0]]).unwrap();
        let info = MatrixInfo::of(&matrix).unwrap();
        assert_eq!(info.dim, 2);
        assert!(info.symmetric);
        assert!(info.positive_definite);

        let report = info.to_string();
        assert!(report.starts_with("* 2x2 Matrix\n* Density: 1\n"));
        assert!(report.contains("* Matrix is positive definite"));
        assert!(report.contains("* Matrix is symmetric"));
    }
}
