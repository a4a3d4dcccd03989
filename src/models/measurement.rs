use nalgebra::{Rotation2, Vector2, Vector3};

use crate::error::{ensure_positive, Result};
use crate::utils::mvn::MultiVariateNormal;

pub trait MeasurementModel {
    /// Express an observation taken from pose `x` in the map frame.
    fn to_map_frame(&self, x: &Vector3<f64>, z: &Vector2<f64>) -> Vector2<f64>;

    /// Log likelihood of a map frame observation given the landmark it was matched to.
    fn log_likelihood(&self, z_map: &Vector2<f64>, landmark: &Vector2<f64>) -> f64;
}

/// Cartesian landmark observations in the vehicle frame, x forward and y left.
///
/// Noise is gaussian and independent on both axes.
#[derive(Debug, Clone)]
pub struct CartesianMeasurementModel {
    mvn: MultiVariateNormal<f64, 2>,
}

impl CartesianMeasurementModel {
    pub fn new(std_devs: &Vector2<f64>) -> Result<CartesianMeasurementModel> {
        ensure_positive("std_landmark_x", std_devs.x)?;
        ensure_positive("std_landmark_y", std_devs.y)?;
        let mvn = MultiVariateNormal::from_std_devs(&Vector2::zeros(), std_devs)?;
        Ok(CartesianMeasurementModel { mvn })
    }
}

impl MeasurementModel for CartesianMeasurementModel {
    fn to_map_frame(&self, x: &Vector3<f64>, z: &Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(x.z) * *z + x.xy()
    }

    fn log_likelihood(&self, z_map: &Vector2<f64>, landmark: &Vector2<f64>) -> f64 {
        self.mvn.ln_pdf_at(z_map, landmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn transform_rotates_then_translates() {
        let model = CartesianMeasurementModel::new(&Vector2::new(0.3, 0.3)).unwrap();
        let x = Vector3::new(4.0, 5.0, -std::f64::consts::FRAC_PI_2);
        let obs = [
            (Vector2::new(2.0, 2.0), (6.0, 3.0)),
            (Vector2::new(3.0, -2.0), (2.0, 2.0)),
            (Vector2::new(0.0, -4.0), (0.0, 5.0)),
        ];
        for (z, (ex, ey)) in obs {
            let z_map = model.to_map_frame(&x, &z);
            assert_approx_eq!(z_map.x, ex, 1e-9);
            assert_approx_eq!(z_map.y, ey, 1e-9);
        }
    }

    #[test]
    fn likelihood_peaks_on_landmark() {
        let model = CartesianMeasurementModel::new(&Vector2::new(0.3, 0.3)).unwrap();
        let lm = Vector2::new(5.0, 3.0);
        let hit = model.log_likelihood(&lm, &lm);
        let miss = model.log_likelihood(&Vector2::new(6.0, 3.0), &lm);
        assert_approx_eq!(hit.exp(), 1.0 / (2.0 * std::f64::consts::PI * 0.09), 1e-9);
        assert!(miss < hit);
        // one metre off at sigma 0.3 costs 1 / (2 * 0.09) nats
        assert_approx_eq!(hit - miss, 1.0 / 0.18, 1e-9);
    }

    #[test]
    fn zero_std_dev_is_rejected() {
        assert!(CartesianMeasurementModel::new(&Vector2::new(0.0, 0.3)).is_err());
    }
}
