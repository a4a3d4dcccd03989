use nalgebra::{RealField, SVector};

use crate::error::Result;
use crate::utils::state::GaussianState;

/// S : State Size, Z: Observation Size, U: Input Size
pub trait BayesianFilter<T: RealField, const S: usize, const Z: usize, const U: usize> {
    /// Predict with `control` if any, then correct with `measurements` if any.
    fn update_estimate(
        &mut self,
        control: Option<SVector<T, U>>,
        measurements: Option<&[SVector<T, Z>]>,
        dt: T,
    ) -> Result<()>;

    /// None until the filter holds a state.
    fn gaussian_estimate(&self) -> Option<GaussianState<T, S>>;
}
