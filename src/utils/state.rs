use nalgebra::{RealField, SMatrix, SVector};

/// Mean and covariance summary of a particle cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianState<T: RealField, const D: usize> {
    /// State Vector
    pub x: SVector<T, D>,
    /// Covariance Matrix
    pub cov: SMatrix<T, D, D>,
}

impl<T: RealField + Copy, const D: usize> GaussianState<T, D> {
    /// Per-axis standard deviations (square roots of the covariance diagonal).
    pub fn std_devs(&self) -> SVector<T, D> {
        self.cov.diagonal().map(|v| v.max(T::zero()).sqrt())
    }
}
