use nalgebra::{Vector2, Vector3};
use rand::RngCore;
use rand_distr::{Distribution, Normal};

use crate::error::{ensure_std_dev, FilterError, Result};

/// Below this yaw rate (rad/s) the arc update is replaced by a straight line.
pub const YAW_RATE_EPSILON: f64 = 1e-5;

/// state : [x, y, yaw], control : [v, yaw_rate]
pub trait MotionModel {
    /// Deterministic part of the motion
    fn prediction(&self, x: &Vector3<f64>, u: &Vector2<f64>, dt: f64) -> Vector3<f64>;

    /// Draw a successor pose: the deterministic step followed by additive pose noise.
    fn sample(
        &self,
        x: &Vector3<f64>,
        u: &Vector2<f64>,
        dt: f64,
        noise: &PoseNoise,
        rng: &mut dyn RngCore,
    ) -> Vector3<f64> {
        self.prediction(x, u, dt) + noise.sample(rng)
    }
}

/// Independent zero-mean gaussian noise on x, y and yaw.
#[derive(Debug, Clone, Copy)]
pub struct PoseNoise {
    x: Normal<f64>,
    y: Normal<f64>,
    yaw: Normal<f64>,
}

impl PoseNoise {
    pub fn new(std_devs: &Vector3<f64>) -> Result<PoseNoise> {
        Ok(PoseNoise {
            x: zero_mean("std_x", std_devs.x)?,
            y: zero_mean("std_y", std_devs.y)?,
            yaw: zero_mean("std_yaw", std_devs.z)?,
        })
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Vector3<f64> {
        Vector3::new(self.x.sample(rng), self.y.sample(rng), self.yaw.sample(rng))
    }
}

pub(crate) fn zero_mean(name: &'static str, std_dev: f64) -> Result<Normal<f64>> {
    ensure_std_dev(name, std_dev)?;
    Normal::new(0.0, std_dev).map_err(|_| FilterError::InvalidParameter {
        name,
        value: std_dev,
    })
}

/// Constant turn rate and velocity model
///
/// x_{t+1} = x_t + v / w * (sin(yaw_t + w * dt) - sin(yaw_t))
///
/// y_{t+1} = y_t + v / w * (cos(yaw_t) - cos(yaw_t + w * dt))
///
/// yaw_{t+1} = yaw_t + w * dt
///
/// and for |w| <= YAW_RATE_EPSILON
///
/// x_{t+1} = x_t + v * dt * cos(yaw_t)
///
/// y_{t+1} = y_t + v * dt * sin(yaw_t)
///
/// Yaw is left unbounded, the trigonometry does not care.
#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity;

impl Velocity {
    pub fn new() -> Velocity {
        Velocity
    }
}

impl MotionModel for Velocity {
    fn prediction(&self, x: &Vector3<f64>, u: &Vector2<f64>, dt: f64) -> Vector3<f64> {
        //state
        let theta = x[2];
        //control
        let v = u[0];
        let w = u[1];
        let delta = if w.abs() > YAW_RATE_EPSILON {
            Vector3::new(
                v / w * ((theta + w * dt).sin() - theta.sin()),
                v / w * (theta.cos() - (theta + w * dt).cos()),
                w * dt,
            )
        } else {
            // no rotation
            Vector3::new(v * theta.cos() * dt, v * theta.sin() * dt, 0.0)
        };
        x + delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn straight_line() {
        let x = Vector3::new(1.0, 2.0, std::f64::consts::FRAC_PI_2);
        let out = Velocity.prediction(&x, &Vector2::new(2.0, 0.0), 0.5);
        assert_approx_eq!(out.x, 1.0);
        assert_approx_eq!(out.y, 3.0);
        assert_approx_eq!(out.z, std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn quarter_turn_arc() {
        // radius v / w = 1, a quarter circle from the origin heading +x
        let w = std::f64::consts::FRAC_PI_2;
        let out = Velocity.prediction(&Vector3::zeros(), &Vector2::new(w, w), 1.0);
        assert_approx_eq!(out.x, 1.0);
        assert_approx_eq!(out.y, 1.0);
        assert_approx_eq!(out.z, w);
    }

    #[test]
    fn yaw_is_not_wrapped() {
        let x = Vector3::new(0.0, 0.0, 3.0);
        let out = Velocity.prediction(&x, &Vector2::new(1.0, 1.0), 1.0);
        assert_approx_eq!(out.z, 4.0);
    }

    #[test]
    fn arc_converges_to_straight_line() {
        let x = Vector3::new(102.0, 65.0, 5.0 * std::f64::consts::PI / 8.0);
        let dt = 0.1;
        let v = 110.0;
        let straight = Velocity.prediction(&x, &Vector2::new(v, 0.0), dt);
        let tiny = Velocity.prediction(&x, &Vector2::new(v, 1e-6), dt);
        assert_approx_eq!(tiny.x, straight.x, 1e-9);
        assert_approx_eq!(tiny.y, straight.y, 1e-9);
        assert_approx_eq!(tiny.z, straight.z, 1e-9);

        // just above the epsilon the arc branch is taken and still agrees
        let arc = Velocity.prediction(&x, &Vector2::new(v, 2e-5), dt);
        assert_approx_eq!(arc.x, straight.x, 1e-4);
        assert_approx_eq!(arc.y, straight.y, 1e-4);
        assert_approx_eq!(arc.z, straight.z, 1e-5);
    }

    #[test]
    fn zero_noise_sample_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = PoseNoise::new(&Vector3::zeros()).unwrap();
        let x = Vector3::new(0.0, 0.0, 0.3);
        let u = Vector2::new(1.5, 0.2);
        let expected = Velocity.prediction(&x, &u, 0.1);
        let out = Velocity.sample(&x, &u, 0.1, &noise, &mut rng);
        assert_eq!(out, expected);
    }

    #[test]
    fn noise_spread_matches_std_devs() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise = PoseNoise::new(&Vector3::new(0.3, 0.3, 0.01)).unwrap();
        let n = 20_000;
        let samples: Vec<Vector3<f64>> = (0..n).map(|_| noise.sample(&mut rng)).collect();
        let var_x = samples.iter().map(|s| s.x * s.x).sum::<f64>() / n as f64;
        let var_yaw = samples.iter().map(|s| s.z * s.z).sum::<f64>() / n as f64;
        assert_approx_eq!(var_x.sqrt(), 0.3, 0.01);
        assert_approx_eq!(var_yaw.sqrt(), 0.01, 0.001);
    }

    #[test]
    fn negative_std_dev_is_rejected() {
        assert!(PoseNoise::new(&Vector3::new(0.3, -0.1, 0.01)).is_err());
        assert!(PoseNoise::new(&Vector3::new(f64::NAN, 0.1, 0.01)).is_err());
    }
}
