//! Band energies as an accuracy proxy for an approximate overlap inverse.
//!
//! In an electronic-structure calculation the overlap matrix `S` is inverted to
//! orthogonalise the Hamiltonian `H`. The band energy `tr(K·H)` with density kernel `K`
//! is invariant under that transformation, so `tr(S·K·H·X)` for an approximation `X` of
//! `S⁻¹` shows directly how much physics the approximation loses.

use std::fmt;

use log::debug;
use ndarray::{Array2, ArrayView2};

use super::{relative_error, spectral_norm, trace_of_product};
use crate::error::{Result, SubmatrixError};
use crate::solver::invert_dense;

/// The matrices of one electronic-structure snapshot.
#[derive(Debug, Clone)]
pub struct ElectronicSystem {
    overlap: Array2<f64>,
    hamiltonian: Array2<f64>,
    ortho_hamiltonian: Array2<f64>,
    density_kernel: Array2<f64>,
}

impl ElectronicSystem {
    pub fn new(
        overlap: Array2<f64>,
        hamiltonian: Array2<f64>,
        ortho_hamiltonian: Array2<f64>,
        density_kernel: Array2<f64>,
    ) -> Result<Self> {
        let (rows, cols) = overlap.dim();
        if rows != cols {
            return Err(SubmatrixError::NotSquare { rows, cols });
        }
        for other in [&hamiltonian, &ortho_hamiltonian, &density_kernel] {
            if other.dim() != (rows, rows) {
                return Err(SubmatrixError::DimensionMismatch {
                    expected: rows,
                    found: other.nrows().max(other.ncols()),
                });
            }
        }
        Ok(ElectronicSystem {
            overlap,
            hamiltonian,
            ortho_hamiltonian,
            density_kernel,
        })
    }

    pub fn dim(&self) -> usize {
        self.overlap.nrows()
    }

    pub fn overlap(&self) -> ArrayView2<'_, f64> {
        self.overlap.view()
    }

    /// `tr(S·K·H·X)`, the band energy seen through an (approximate) overlap inverse `X`.
    pub fn ortho_energy_with(&self, overlap_inverse: ArrayView2<'_, f64>) -> Result<f64> {
        if overlap_inverse.dim() != self.overlap.dim() {
            return Err(SubmatrixError::DimensionMismatch {
                expected: self.dim(),
                found: overlap_inverse.nrows(),
            });
        }
        trace_of_product(&[
            self.overlap.view(),
            self.density_kernel.view(),
            self.hamiltonian.view(),
            overlap_inverse.reborrow(),
        ])
    }

    /// Compares the band energy obtained through `approx_inverse` with the exact one.
    pub fn band_energies(&self, approx_inverse: ArrayView2<'_, f64>) -> Result<BandEnergies> {
        let reference = trace_of_product(&[self.density_kernel.view(), self.hamiltonian.view()])?;
        let ortho = trace_of_product(&[
            self.overlap.view(),
            self.density_kernel.view(),
            self.ortho_hamiltonian.view(),
        ])?;

        let exact_inverse = invert_dense(self.overlap.view())?;
        let recalculated = self.hamiltonian.dot(&exact_inverse);
        let ortho_residual = spectral_norm((&recalculated - &self.ortho_hamiltonian).view());
        let ortho_recalculated = self.ortho_energy_with(exact_inverse.view())?;

        let ortho_approx = self.ortho_energy_with(approx_inverse)?;
        let ortho_identity = self.ortho_energy_with(Array2::<f64>::eye(self.dim()).view())?;
        debug!(
            "band energy {} (approx {}, identity {})",
            reference, ortho_approx, ortho_identity
        );

        Ok(BandEnergies {
            reference,
            ortho,
            ortho_recalculated,
            ortho_approx,
            ortho_identity,
            ortho_residual,
        })
    }
}

/// Band energies from the different routes, all compared against `reference`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandEnergies {
    /// `tr(K·H)`
    pub reference: f64,
    /// `tr(S·K·H_ortho)` with the stored orthogonalised Hamiltonian.
    pub ortho: f64,
    /// `tr(S·K·H·S⁻¹)` with the exact inverse.
    pub ortho_recalculated: f64,
    /// `tr(S·K·H·X)` with the approximate inverse.
    pub ortho_approx: f64,
    /// `tr(S·K·H)`, i.e. `S⁻¹` replaced by the identity.
    pub ortho_identity: f64,
    /// `‖H·S⁻¹ − H_ortho‖₂`
    pub ortho_residual: f64,
}

impl BandEnergies {
    pub fn ortho_error(&self) -> f64 {
        relative_error(self.ortho, self.reference)
    }

    pub fn recalculated_error(&self) -> f64 {
        relative_error(self.ortho_recalculated, self.reference)
    }

    pub fn approx_error(&self) -> f64 {
        relative_error(self.ortho_approx, self.reference)
    }

    pub fn identity_error(&self) -> f64 {
        relative_error(self.ortho_identity, self.reference)
    }
}

impl fmt::Display for BandEnergies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Band energy: {}", self.reference)?;
        writeln!(f, "Band energy ortho: {}", self.ortho)?;
        writeln!(f, "relError band energy ortho: {}", self.ortho_error())?;
        writeln!(f, "Band energy ortho recalc: {}", self.ortho_recalculated)?;
        writeln!(f, "relError band energy ortho recalc: {}", self.recalculated_error())?;
        writeln!(f, "Band energy ortho approx: {}", self.ortho_approx)?;
        writeln!(f, "relError band energy ortho approx: {}", self.approx_error())?;
        writeln!(f, "Band energy ortho=I: {}", self.ortho_identity)?;
        write!(f, "relError band energy ortho=I: {}", self.identity_error())
    }
}
