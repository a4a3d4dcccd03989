//! Synthetic drive through a landmark map.
//!
//! A vehicle follows a constant velocity / yaw rate arc. Each step yields the
//! ground truth pose, the noisy control that produced it, and noisy vehicle frame
//! observations of every landmark in sensor range.

use nalgebra::{Rotation2, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::map::{Landmark, LandmarkMap};
use crate::error::{ensure_finite, ensure_positive, FilterError, Result};
use crate::models::motion::{zero_mean, MotionModel, Velocity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub dt: f64,
    pub velocity: f64,
    pub yaw_rate: f64,
    /// Std devs [v, yaw_rate] of the reported control
    pub control_std: [f64; 2],
    /// Std devs [x, y] of observations
    pub observation_std: [f64; 2],
    pub sensor_range: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            velocity: 5.0,
            yaw_rate: 0.1,
            control_std: [0.1, 0.005],
            observation_std: [0.3, 0.3],
            sensor_range: 50.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationStep {
    pub time: f64,
    pub ground_truth: Vector3<f64>,
    /// Noisy [v, yaw_rate] applied since the previous step
    pub control: Vector2<f64>,
    pub observations: Vec<Vector2<f64>>,
}

pub struct Simulation {
    config: SimulationConfig,
    map: LandmarkMap,
    motion_model: Velocity,
    pose: Vector3<f64>,
    time: f64,
    rng: StdRng,
    control_noise: [Normal<f64>; 2],
    observation_noise: [Normal<f64>; 2],
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        map: LandmarkMap,
        initial_pose: Vector3<f64>,
    ) -> Result<Simulation> {
        if !(config.dt.is_finite() && config.dt > 0.0) {
            return Err(FilterError::InvalidTimeStep(config.dt));
        }
        ensure_finite("velocity", config.velocity)?;
        ensure_finite("yaw_rate", config.yaw_rate)?;
        ensure_positive("sensor_range", config.sensor_range)?;
        let control_noise = [
            zero_mean("control_std_v", config.control_std[0])?,
            zero_mean("control_std_yaw_rate", config.control_std[1])?,
        ];
        let observation_noise = [
            zero_mean("observation_std_x", config.observation_std[0])?,
            zero_mean("observation_std_y", config.observation_std[1])?,
        ];
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Simulation {
            config,
            map,
            motion_model: Velocity::new(),
            pose: initial_pose,
            time: 0.0,
            rng,
            control_noise,
            observation_noise,
        })
    }

    fn observe(&mut self) -> Vec<Vector2<f64>> {
        let to_vehicle = Rotation2::new(-self.pose.z);
        let xy = self.pose.xy();
        let range = self.config.sensor_range;
        let mut observations = Vec::new();
        for lm in self.map.iter() {
            let delta = lm.position() - xy;
            if delta.norm() > range {
                continue;
            }
            let noise = Vector2::new(
                self.observation_noise[0].sample(&mut self.rng),
                self.observation_noise[1].sample(&mut self.rng),
            );
            observations.push(to_vehicle * delta + noise);
        }
        observations
    }
}

impl Iterator for Simulation {
    type Item = SimulationStep;

    fn next(&mut self) -> Option<Self::Item> {
        let u = Vector2::new(self.config.velocity, self.config.yaw_rate);
        self.pose = self.motion_model.prediction(&self.pose, &u, self.config.dt);
        self.time += self.config.dt;
        let control = u + Vector2::new(
            self.control_noise[0].sample(&mut self.rng),
            self.control_noise[1].sample(&mut self.rng),
        );
        let observations = self.observe();
        Some(SimulationStep {
            time: self.time,
            ground_truth: self.pose,
            control,
            observations,
        })
    }
}

/// `n` landmarks with ids 1..=n scattered uniformly over a square of side `2 * half_extent`.
pub fn random_map(n: u32, half_extent: f64, seed: u64) -> Result<LandmarkMap> {
    ensure_positive("half_extent", half_extent)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let landmarks = (1..=n)
        .map(|id| {
            Landmark::new(
                id,
                rng.gen_range(-half_extent..half_extent),
                rng.gen_range(-half_extent..half_extent),
            )
        })
        .collect();
    LandmarkMap::new(landmarks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn noiseless_observations_are_exact() -> Result<()> {
        let map = LandmarkMap::new(vec![
            Landmark::new(1, 10.0, 0.0),
            Landmark::new(2, 0.0, 100.0),
        ])?;
        let config = SimulationConfig {
            velocity: 1.0,
            yaw_rate: 0.0,
            control_std: [0.0, 0.0],
            observation_std: [0.0, 0.0],
            sensor_range: 20.0,
            dt: 1.0,
            seed: 1,
        };
        let mut sim = Simulation::new(config, map, Vector3::zeros())?;
        let step = sim.next().unwrap();
        assert_approx_eq!(step.ground_truth.x, 1.0);
        assert_eq!(step.control, Vector2::new(1.0, 0.0));
        // landmark 2 is out of range
        assert_eq!(step.observations.len(), 1);
        assert_approx_eq!(step.observations[0].x, 9.0);
        assert_approx_eq!(step.observations[0].y, 0.0);
        Ok(())
    }

    #[test]
    fn observations_are_in_the_vehicle_frame() -> Result<()> {
        let map = LandmarkMap::new(vec![Landmark::new(1, 0.0, 10.0)])?;
        let config = SimulationConfig {
            velocity: 0.0,
            yaw_rate: 0.0,
            control_std: [0.0, 0.0],
            observation_std: [0.0, 0.0],
            ..Default::default()
        };
        // heading +y, the landmark is dead ahead
        let pose = Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let step = Simulation::new(config, map, pose)?.next().unwrap();
        assert_approx_eq!(step.observations[0].x, 10.0);
        assert_approx_eq!(step.observations[0].y, 0.0);
        Ok(())
    }

    #[test]
    fn random_map_is_reproducible() -> Result<()> {
        let a = random_map(20, 50.0, 3)?;
        let b = random_map(20, 50.0, 3)?;
        assert_eq!(a.landmarks(), b.landmarks());
        assert_eq!(a.len(), 20);
        assert!(a.iter().all(|lm| lm.x.abs() <= 50.0 && lm.y.abs() <= 50.0));
        Ok(())
    }

    #[test]
    fn invalid_time_step_is_rejected() {
        let config = SimulationConfig {
            dt: 0.0,
            ..Default::default()
        };
        let res = Simulation::new(config, LandmarkMap::default(), Vector3::zeros());
        assert!(matches!(res, Err(FilterError::InvalidTimeStep(_))));
    }
}
