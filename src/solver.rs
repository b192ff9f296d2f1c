//! Dense solves on extracted submatrices.
//!
//! A plain inverse goes through an LU factorisation (LAPACK `getrf`/`getri` with the
//! `lapack` feature, nalgebra's own LU otherwise). Every other exponent is applied through a
//! symmetric eigendecomposition `S = Q diag(λ) Qᵀ`, giving `S^k = Q diag(λ^k) Qᵀ`.

use std::fmt;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::{SolveError, SubmatrixError};

const CBRT_TOLERANCE: f64 = 1e-12;
/// Relative asymmetry accepted from round-off in stored matrices.
const SYMMETRY_TOLERANCE: f64 = 1e-8;
/// Largest `k` recognised in an exponent `-1/k`.
const MAX_ROOT_ORDER: f64 = 64.0;

/// Power the submatrices are raised to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Exponent {
    /// `-1`
    #[default]
    Inverse,
    /// `-1/2`
    InverseSqrt,
    /// `-1/3`
    InverseCbrt,
    Real(f64),
}

impl Exponent {
    /// Maps `-1`, `-0.5` and `-1/3` onto their dedicated variants.
    pub fn from_value(value: f64) -> Self {
        if value == -1.0 {
            Exponent::Inverse
        } else if value == -0.5 {
            Exponent::InverseSqrt
        } else if (value + 1.0 / 3.0).abs() < CBRT_TOLERANCE {
            Exponent::InverseCbrt
        } else {
            Exponent::Real(value)
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Exponent::Inverse => -1.0,
            Exponent::InverseSqrt => -0.5,
            Exponent::InverseCbrt => -1.0 / 3.0,
            Exponent::Real(value) => value,
        }
    }

    /// `k` such that the exponent is `-1/k` for a positive integer `k`.
    pub fn root_order(self) -> Option<u32> {
        match self {
            Exponent::Inverse => Some(1),
            Exponent::InverseSqrt => Some(2),
            Exponent::InverseCbrt => Some(3),
            Exponent::Real(value) if value < 0.0 => {
                let k = -1.0 / value;
                let rounded = k.round();
                ((k - rounded).abs() < 1e-9 && (1.0..=MAX_ROOT_ORDER).contains(&rounded))
                    .then_some(rounded as u32)
            }
            Exponent::Real(_) => None,
        }
    }

    fn is_integer(self) -> bool {
        let value = self.value();
        value.fract() == 0.0
    }

    fn apply(self, eigenvalue: f64) -> f64 {
        match self {
            Exponent::Inverse => eigenvalue.recip(),
            Exponent::InverseSqrt => eigenvalue.sqrt().recip(),
            Exponent::InverseCbrt => eigenvalue.cbrt().recip(),
            Exponent::Real(value) if self.is_integer() => eigenvalue.powi(value as i32),
            Exponent::Real(value) => eigenvalue.powf(value),
        }
    }
}

impl From<f64> for Exponent {
    fn from(value: f64) -> Self {
        Exponent::from_value(value)
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exponent::Inverse => write!(f, "-1"),
            Exponent::InverseSqrt => write!(f, "-1/2"),
            Exponent::InverseCbrt => write!(f, "-1/3"),
            Exponent::Real(value) => write!(f, "{}", value),
        }
    }
}

/// Raises a dense submatrix to `exponent`.
pub fn solve(submatrix: DMatrix<f64>, exponent: Exponent) -> Result<DMatrix<f64>, SolveError> {
    match exponent {
        Exponent::Inverse => invert(submatrix),
        _ => fractional_power(submatrix, exponent),
    }
}

fn singular_tolerance(dim: usize, scale: f64) -> f64 {
    dim.max(1) as f64 * f64::EPSILON * scale
}

#[cfg(not(feature = "lapack"))]
fn invert(submatrix: DMatrix<f64>) -> Result<DMatrix<f64>, SolveError> {
    let dim = submatrix.nrows();
    let lu = submatrix.lu();
    check_pivots(lu.u().diagonal().as_slice(), dim)?;
    let inverse = lu.try_inverse().ok_or(SolveError::Singular { dim })?;
    finite_or_singular(inverse, dim)
}

#[cfg(feature = "lapack")]
fn invert(submatrix: DMatrix<f64>) -> Result<DMatrix<f64>, SolveError> {
    let dim = submatrix.nrows();
    let lu = nalgebra_lapack::LU::new(submatrix);
    check_pivots(lu.u().diagonal().as_slice(), dim)?;
    let inverse = lu.inverse().ok_or(SolveError::Singular { dim })?;
    finite_or_singular(inverse, dim)
}

fn check_pivots(diagonal: &[f64], dim: usize) -> Result<(), SolveError> {
    let scale = diagonal.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
    let tolerance = singular_tolerance(dim, scale);
    if scale == 0.0 || diagonal.iter().any(|d| d.abs() <= tolerance) {
        return Err(SolveError::Singular { dim });
    }
    Ok(())
}

fn finite_or_singular(
    matrix: DMatrix<f64>,
    dim: usize,
) -> Result<DMatrix<f64>, SolveError> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(matrix)
    } else {
        Err(SolveError::Singular { dim })
    }
}

/// `(S + Sᵀ) / 2` when `S` is symmetric up to `SYMMETRY_TOLERANCE·max|s|`, `None` otherwise.
fn symmetrized(matrix: DMatrix<f64>) -> Option<DMatrix<f64>> {
    let tolerance = SYMMETRY_TOLERANCE * matrix.amax();
    let n = matrix.nrows();
    let symmetric =
        (0..n).all(|i| (0..i).all(|j| (matrix[(i, j)] - matrix[(j, i)]).abs() <= tolerance));
    symmetric.then(|| (&matrix + matrix.transpose()) * 0.5)
}

fn fractional_power(
    submatrix: DMatrix<f64>,
    exponent: Exponent,
) -> Result<DMatrix<f64>, SolveError> {
    let dim = submatrix.nrows();
    let submatrix = symmetrized(submatrix).ok_or(SolveError::NotSymmetric)?;

    let eigen = SymmetricEigen::new(submatrix);
    let scale = eigen.eigenvalues.amax();
    let tolerance = singular_tolerance(dim, scale);
    let negative_power = exponent.value() < 0.0;

    for &eigenvalue in eigen.eigenvalues.iter() {
        if negative_power && eigenvalue.abs() <= tolerance {
            return Err(SolveError::Singular { dim });
        }
        if eigenvalue < 0.0 && !exponent.is_integer() {
            return Err(SolveError::Indefinite {
                eigenvalue,
                exponent: exponent.value(),
            });
        }
    }
    if negative_power && scale == 0.0 {
        return Err(SolveError::Singular { dim });
    }

    let powered = eigen.eigenvalues.map(|lambda| exponent.apply(lambda));
    let q = &eigen.eigenvectors;
    let result = q * DMatrix::from_diagonal(&powered) * q.transpose();
    finite_or_singular(result, dim)
}

/// Exact dense inverse, used as the reference the approximation is measured against.
pub fn invert_dense(matrix: ArrayView2<'_, f64>) -> crate::error::Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(SubmatrixError::NotSquare { rows, cols });
    }
    let inverse = invert(matrix.into_nalgebra().clone_owned())?;
    Ok(inverse.into_ndarray2())
}

/// Exact dense power `matrix^exponent` of a symmetric matrix.
pub fn power_dense(
    matrix: ArrayView2<'_, f64>,
    exponent: Exponent,
) -> crate::error::Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(SubmatrixError::NotSquare { rows, cols });
    }
    let powered = solve(matrix.into_nalgebra().clone_owned(), exponent)?;
    Ok(powered.into_ndarray2())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;
    use ndarray::array;

    fn spd_2x2() -> DMatrix<f64> {
        dmatrix![4.0, 1.0; 1.0, 3.0]
    }

    #[test]
    fn test_inverse_of_diagonal_is_exact() {
        let a = DMatrix::from_diagonal(&nalgebra::dvector![2.0, 4.0, 5.0, 10.0]);
        let inverse = solve(a, Exponent::Inverse).unwrap();
        let expected = DMatrix::from_diagonal(&nalgebra::dvector![0.5, 0.25, 0.2, 0.1]);
        assert_eq!(inverse, expected);
    }

    #[test]
    fn test_inverse_2x2() {
        let inverse = solve(spd_2x2(), Exponent::Inverse).unwrap();
        let expected = dmatrix![3.0, -1.0; -1.0, 4.0] / 11.0;
        assert_relative_eq!(inverse, expected, epsilon = 1e-14);
    }

    #[test]
    fn test_repeated_row_is_singular() {
        let a = dmatrix![1.0, 2.0; 1.0, 2.0];
        assert_eq!(
            solve(a, Exponent::Inverse),
            Err(SolveError::Singular { dim: 2 })
        );
    }

    #[test]
    fn test_inverse_square_root() {
        let a = spd_2x2();
        let x = solve(a.clone(), Exponent::InverseSqrt).unwrap();
        let identity = &x * &x * &a;
        assert_relative_eq!(identity, DMatrix::identity(2, 2), epsilon = 1e-12);
        // the principal root is symmetric
        assert_relative_eq!(x.clone(), x.transpose(), epsilon = 1e-14);
    }

    #[test]
    fn test_inverse_cube_root() {
        let a = spd_2x2();
        let x = solve(a.clone(), Exponent::InverseCbrt).unwrap();
        let identity = &x * &x * &x * &a;
        assert_relative_eq!(identity, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn test_integer_power_through_eigen() {
        let a = dmatrix![2.0, 0.0; 0.0, -3.0];
        let squared = solve(a, Exponent::Real(2.0)).unwrap();
        assert_relative_eq!(squared, dmatrix![4.0, 0.0; 0.0, 9.0], epsilon = 1e-12);
    }

    #[test]
    fn test_fractional_power_rejects_non_symmetric() {
        let a = dmatrix![1.0, 2.0; 0.0, 1.0];
        assert_eq!(
            solve(a, Exponent::InverseSqrt),
            Err(SolveError::NotSymmetric)
        );
    }

    #[test]
    fn test_fractional_power_accepts_round_off_asymmetry() {
        let a = dmatrix![4.0, 1.0, 0.0; 1.0, 4.0, 1.0; 0.0, 1.0, 4.0];
        let mut perturbed = a.clone();
        perturbed[(1, 0)] += 1e-12;

        let expected = solve(a, Exponent::InverseSqrt).unwrap();
        let root = solve(perturbed, Exponent::InverseSqrt).unwrap();
        assert_relative_eq!(root, expected, epsilon = 1e-11);
        assert_relative_eq!(root, root.transpose(), epsilon = 1e-14);
    }

    #[test]
    fn test_fractional_power_rejects_negative_eigenvalue() {
        let a = dmatrix![1.0, 0.0; 0.0, -1.0];
        assert!(matches!(
            solve(a, Exponent::InverseSqrt),
            Err(SolveError::Indefinite { eigenvalue, exponent })
                if eigenvalue < 0.0 && exponent == -0.5
        ));
    }

    #[test]
    fn test_fractional_power_rejects_zero_eigenvalue() {
        let a = dmatrix![1.0, 0.0; 0.0, 0.0];
        assert_eq!(
            solve(a, Exponent::InverseSqrt),
            Err(SolveError::Singular { dim: 2 })
        );
    }

    #[test]
    fn test_exponent_from_value() {
        assert_eq!(Exponent::from_value(-1.0), Exponent::Inverse);
        assert_eq!(Exponent::from_value(-0.5), Exponent::InverseSqrt);
        assert_eq!(Exponent::from_value(-1.0 / 3.0), Exponent::InverseCbrt);
        assert_eq!(Exponent::from(0.75), Exponent::Real(0.75));

        assert_eq!(Exponent::InverseCbrt.root_order(), Some(3));
        assert_eq!(Exponent::Real(-0.25).root_order(), Some(4));
        assert_eq!(Exponent::Real(-0.4).root_order(), None);
        assert_eq!(Exponent::Real(0.5).root_order(), None);
        assert_eq!(Exponent::Real(-1.0 / 64.0).root_order(), Some(64));
        assert_eq!(Exponent::Real(-1e-12).root_order(), None);
        assert_eq!(Exponent::InverseSqrt.to_string(), "-1/2");
    }

    #[test]
    fn test_invert_dense() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let inverse = invert_dense(a.view()).unwrap();
        let expected = array![[3.0, -1.0], [-1.0, 4.0]] / 11.0;
        for (x, y) in inverse.iter().zip(expected.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-14);
        }

        let not_square = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            invert_dense(not_square.view()),
            Err(SubmatrixError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_power_dense_matches_solve() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let x = power_dense(a.view(), Exponent::InverseSqrt).unwrap();
        let check = x.dot(&x).dot(&a);
        assert_relative_eq!(check[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(check[[0, 1]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(check[[1, 1]], 1.0, epsilon = 1e-12);
    }
}
