use nalgebra::{Matrix3, SVector, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

use crate::data::map::LandmarkMap;
use crate::error::{ensure_finite, ensure_positive, ensure_std_dev, FilterError, Result};
use crate::localization::association::{self, Association};
use crate::localization::bayesian_filter::BayesianFilter;
use crate::localization::resampling::ResamplingScheme;
use crate::models::measurement::CartesianMeasurementModel;
use crate::models::motion::{MotionModel, PoseNoise, Velocity};
use crate::utils::normalize_angle;
use crate::utils::state::GaussianState;

/// One pose hypothesis: [x, y, yaw] in the map frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position in the current set, reassigned by every resample
    pub id: usize,
    pub pose: Vector3<f64>,
    /// Relative importance, not normalized
    pub weight: f64,
    /// Landmarks matched during the last weight update
    pub associations: Vec<Association>,
}

impl Particle {
    pub fn new(id: usize, pose: Vector3<f64>) -> Particle {
        Particle::with_weight(id, pose, 1.0)
    }

    pub fn with_weight(id: usize, pose: Vector3<f64>, weight: f64) -> Particle {
        Particle {
            id,
            pose,
            weight,
            associations: Vec::new(),
        }
    }

    pub fn set_associations(&mut self, associations: Vec<Association>) {
        self.associations = associations;
    }

    /// Landmark ids, space separated. Observations without a landmark in range show as -1.
    pub fn associations_text(&self) -> String {
        join(self.associations.iter().map(|a| match a.landmark_id {
            Some(id) => i64::from(id),
            None => -1,
        }))
    }

    /// Map frame x of the associated landmarks, space separated.
    pub fn sense_x_text(&self) -> String {
        join(self.associations.iter().map(|a| a.x))
    }

    /// Map frame y of the associated landmarks, space separated.
    pub fn sense_y_text(&self) -> String {
        join(self.associations.iter().map(|a| a.y))
    }
}

/// `x y yaw weight`, one particle per line in trajectory dumps.
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.pose.x, self.pose.y, self.pose.z, self.weight
        )
    }
}

fn join<T: Display>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Noise levels, sensor range and set size of a particle filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleFilterConfig {
    /// Number of particles drawn at initialization.
    pub num_particles: usize,

    /// Std devs [x, y, yaw] of the initial pose estimate.
    pub init_std: [f64; 3],

    /// Std devs [x, y, yaw] added to every predicted pose.
    pub motion_std: [f64; 3],

    /// Std devs [x, y] of landmark observations.
    pub landmark_std: [f64; 2],

    /// Landmarks further away than this are never matched.
    pub sensor_range: f64,

    pub resampling: ResamplingScheme,

    /// Seed for reproducible runs, None draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            num_particles: 100,
            init_std: [0.3, 0.3, 0.01],
            motion_std: [0.3, 0.3, 0.01],
            landmark_std: [0.3, 0.3],
            sensor_range: 50.0,
            resampling: ResamplingScheme::default(),
            seed: None,
        }
    }
}

impl ParticleFilterConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, std) in ["init_std_x", "init_std_y", "init_std_yaw"]
            .into_iter()
            .zip(self.init_std)
        {
            ensure_std_dev(name, std)?;
        }
        for (name, std) in ["motion_std_x", "motion_std_y", "motion_std_yaw"]
            .into_iter()
            .zip(self.motion_std)
        {
            ensure_std_dev(name, std)?;
        }
        ensure_positive("landmark_std_x", self.landmark_std[0])?;
        ensure_positive("landmark_std_y", self.landmark_std[1])?;
        ensure_positive("sensor_range", self.sensor_range)?;
        Ok(())
    }

    pub fn init_std(&self) -> Vector3<f64> {
        Vector3::from(self.init_std)
    }

    pub fn motion_std(&self) -> Vector3<f64> {
        Vector3::from(self.motion_std)
    }

    pub fn landmark_std(&self) -> Vector2<f64> {
        Vector2::from(self.landmark_std)
    }
}

/// Monte Carlo localization against a map of known landmarks.
///
/// One cycle is `prediction` -> `update_weights` -> `resample`. The filter owns
/// its random generator so a seeded filter replays the same run.
pub struct ParticleFilter {
    config: ParticleFilterConfig,
    landmarks: LandmarkMap,
    motion_model: Box<dyn MotionModel>,
    rng: StdRng,
    initialized: bool,
    particles: Vec<Particle>,
}

impl ParticleFilter {
    pub fn new(config: ParticleFilterConfig, landmarks: LandmarkMap) -> Result<ParticleFilter> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(ParticleFilter {
            config,
            landmarks,
            motion_model: Box::new(Velocity::new()),
            rng,
            initialized: false,
            particles: Vec::new(),
        })
    }

    /// Start from an existing particle set instead of sampling one.
    pub fn from_particles(
        config: ParticleFilterConfig,
        landmarks: LandmarkMap,
        particles: Vec<Particle>,
    ) -> Result<ParticleFilter> {
        for p in &particles {
            ensure_pose(&p.pose)?;
            ensure_std_dev("weight", p.weight)?;
        }
        let mut pf = ParticleFilter::new(config, landmarks)?;
        pf.particles = particles;
        pf.initialized = true;
        Ok(pf)
    }

    pub fn with_motion_model(mut self, motion_model: Box<dyn MotionModel>) -> ParticleFilter {
        self.motion_model = motion_model;
        self
    }

    /// Sample `num_particles` poses around `x` with per-axis std devs `std`.
    ///
    /// Does nothing once the filter is initialized.
    pub fn init(
        &mut self,
        x: &Vector3<f64>,
        std: &Vector3<f64>,
        num_particles: usize,
    ) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        ensure_pose(x)?;
        let noise = PoseNoise::new(std)?;
        if num_particles == 0 {
            log::warn!("particle filter initialized without particles");
        }
        let rng = &mut self.rng;
        self.particles = (0..num_particles)
            .map(|id| Particle::new(id, x + noise.sample(&mut *rng)))
            .collect();
        self.initialized = true;
        log::info!(
            "initialized {} particles around ({:.3}, {:.3}, {:.3})",
            num_particles,
            x.x,
            x.y,
            x.z
        );
        Ok(())
    }

    /// `init` with the particle count and spread of the configuration.
    pub fn initialize(&mut self, x: &Vector3<f64>) -> Result<()> {
        let std = self.config.init_std();
        self.init(x, &std, self.config.num_particles)
    }

    /// Move every particle by the control `u = [v, yaw_rate]` over `dt`, plus noise.
    pub fn prediction(
        &mut self,
        dt: f64,
        std_pos: &Vector3<f64>,
        u: &Vector2<f64>,
    ) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(FilterError::InvalidTimeStep(dt));
        }
        ensure_finite("velocity", u.x)?;
        ensure_finite("yaw_rate", u.y)?;
        let noise = PoseNoise::new(std_pos)?;
        let motion_model = &self.motion_model;
        let rng: &mut dyn RngCore = &mut self.rng;
        self.particles = self
            .particles
            .iter()
            .map(|p| Particle {
                pose: motion_model.sample(&p.pose, u, dt, &noise, &mut *rng),
                ..p.clone()
            })
            .collect();
        Ok(())
    }

    /// Reweight every particle against `observations`, given in the vehicle frame,
    /// and the landmarks of the filter's map.
    ///
    /// Weights are reset before the update, so they only reflect this batch. They
    /// are relative: the most likely particle weighs 1.
    pub fn update_weights(
        &mut self,
        sensor_range: f64,
        std_landmark: &Vector2<f64>,
        observations: &[Vector2<f64>],
    ) -> Result<()> {
        self.particles = reweight(
            &self.particles,
            sensor_range,
            std_landmark,
            observations,
            &self.landmarks,
        )?;
        Ok(())
    }

    /// Draw a new set of the same size, with replacement, proportionally to weight.
    pub fn resample(&mut self) {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let indices = self.config.resampling.resample(&weights, &mut self.rng);
        self.particles = indices
            .into_iter()
            .enumerate()
            .map(|(id, i)| Particle {
                id,
                ..self.particles[i].clone()
            })
            .collect();
    }

    /// One full cycle with the noise levels and sensor range of the configuration.
    pub fn step(
        &mut self,
        dt: f64,
        u: &Vector2<f64>,
        observations: &[Vector2<f64>],
    ) -> Result<()> {
        self.update_estimate(Some(*u), Some(observations), dt)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }

    pub fn landmarks(&self) -> &LandmarkMap {
        &self.landmarks
    }

    /// Highest weight particle, the first one on ties.
    pub fn best_particle(&self) -> Option<&Particle> {
        self.particles.iter().fold(None, |best, p| match best {
            Some(b) if b.weight >= p.weight => Some(b),
            _ => Some(p),
        })
    }

    /// Normalized weights; uniform when the weights sum to zero or overflow.
    fn normalized_weights(&self) -> Vec<f64> {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        let n = self.particles.len() as f64;
        if total > 0.0 && total.is_finite() {
            self.particles.iter().map(|p| p.weight / total).collect()
        } else {
            vec![1.0 / n; self.particles.len()]
        }
    }

    /// Weighted mean pose, the yaw being a circular mean.
    pub fn weighted_mean(&self) -> Option<Vector3<f64>> {
        if self.particles.is_empty() {
            return None;
        }
        let weights = self.normalized_weights();
        let (mut x, mut y, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0);
        for (p, w) in self.particles.iter().zip(&weights) {
            x += w * p.pose.x;
            y += w * p.pose.y;
            sin += w * p.pose.z.sin();
            cos += w * p.pose.z.cos();
        }
        Some(Vector3::new(x, y, sin.atan2(cos)))
    }

    /// Kish effective sample size, 0 when every weight is 0.
    pub fn effective_sample_size(&self) -> f64 {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if !(total > 0.0 && total.is_finite()) {
            return 0.0;
        }
        let sum_sq: f64 = self
            .particles
            .iter()
            .map(|p| (p.weight / total).powi(2))
            .sum();
        1.0 / sum_sq
    }
}

impl BayesianFilter<f64, 3, 2, 2> for ParticleFilter {
    fn update_estimate(
        &mut self,
        control: Option<Vector2<f64>>,
        measurements: Option<&[Vector2<f64>]>,
        dt: f64,
    ) -> Result<()> {
        if !self.initialized {
            log::debug!("update before initialization ignored");
            return Ok(());
        }
        if let Some(u) = control {
            let std = self.config.motion_std();
            self.prediction(dt, &std, &u)?;
        }
        if let Some(observations) = measurements {
            let landmark_std = self.config.landmark_std();
            self.update_weights(self.config.sensor_range, &landmark_std, observations)?;
            log::debug!(
                "{} observations, ess {:.1}",
                observations.len(),
                self.effective_sample_size()
            );
            self.resample();
        }
        Ok(())
    }

    fn gaussian_estimate(&self) -> Option<GaussianState<f64, 3>> {
        let x = self.weighted_mean()?;
        let weights = self.normalized_weights();
        let cov = self
            .particles
            .iter()
            .zip(&weights)
            .map(|(p, w)| {
                let mut dx: SVector<f64, 3> = p.pose - x;
                dx.z = normalize_angle(dx.z);
                dx * dx.transpose() * *w
            })
            .fold(Matrix3::zeros(), |a, b| a + b);
        Some(GaussianState { x, cov })
    }
}

impl Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("initialized", &self.initialized)
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.effective_sample_size())
            .field("mean", &self.weighted_mean())
            .field("landmarks", &self.landmarks.len())
            .finish()
    }
}

fn reweight(
    particles: &[Particle],
    sensor_range: f64,
    std_landmark: &Vector2<f64>,
    observations: &[Vector2<f64>],
    map: &LandmarkMap,
) -> Result<Vec<Particle>> {
    ensure_positive("sensor_range", sensor_range)?;
    for z in observations {
        ensure_finite("observation_x", z.x)?;
        ensure_finite("observation_y", z.y)?;
    }
    let measurement_model = CartesianMeasurementModel::new(std_landmark)?;
    let weighed: Vec<(f64, Vec<Association>)> = particles
        .iter()
        .map(|p| association::weigh(&p.pose, observations, map, sensor_range, &measurement_model))
        .collect();
    // relative weights, the most likely particle weighs 1
    let max_log_weight = weighed
        .iter()
        .map(|(log_weight, _)| *log_weight)
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(particles
        .iter()
        .zip(weighed)
        .map(|(p, (log_weight, associations))| {
            let weight = if max_log_weight.is_finite() {
                (log_weight - max_log_weight).exp()
            } else {
                0.0
            };
            Particle {
                id: p.id,
                pose: p.pose,
                weight,
                associations,
            }
        })
        .collect())
}

fn ensure_pose(x: &Vector3<f64>) -> Result<()> {
    ensure_finite("x", x.x)?;
    ensure_finite("y", x.y)?;
    ensure_finite("yaw", x.z)
}
