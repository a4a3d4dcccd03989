use nalgebra::{RealField, SMatrix, SVector};

use crate::error::{FilterError, Result};

/// Multivariate normal distribution, evaluated through its precision matrix.
#[derive(Debug, Clone)]
pub struct MultiVariateNormal<T: RealField, const D: usize> {
    mean: SVector<T, D>,
    precision: SMatrix<T, D, D>,
    ln_factor: T,
}

impl<T: RealField + Copy, const D: usize> MultiVariateNormal<T, D> {
    pub fn new(mean: &SVector<T, D>, covariance: &SMatrix<T, D, D>) -> Result<Self> {
        let Some(covariance_cholesky) = covariance.clone().cholesky() else {
            return Err(FilterError::CovarianceNotPositiveDefinite);
        };
        let det = covariance_cholesky.determinant();
        let precision = covariance_cholesky.inverse();
        let ln_factor = -(T::two_pi().powi(D as i32) * det).sqrt().ln();
        Ok(MultiVariateNormal {
            mean: *mean,
            precision,
            ln_factor,
        })
    }

    /// Axis-independent distribution: diagonal covariance built from per-axis std devs.
    pub fn from_std_devs(mean: &SVector<T, D>, std_devs: &SVector<T, D>) -> Result<Self> {
        let covariance = SMatrix::<T, D, D>::from_diagonal(&std_devs.component_mul(std_devs));
        Self::new(mean, &covariance)
    }

    /// Probability density function
    pub fn pdf(&self, x: &SVector<T, D>) -> T {
        self.ln_pdf_at(x, &self.mean).exp()
    }

    /// Log density of `x` for the same covariance but centered on `mean`.
    ///
    /// Stays finite where the density itself would underflow to 0.
    pub fn ln_pdf_at(&self, x: &SVector<T, D>, mean: &SVector<T, D>) -> T {
        let dx = mean - x;
        let neg_half = T::from_f64(-0.5).unwrap_or_else(T::zero);
        let interior = (dx.transpose() * self.precision * dx).x;
        self.ln_factor + neg_half * interior
    }
}
