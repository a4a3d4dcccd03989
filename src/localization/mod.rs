pub mod association;
mod bayesian_filter;
mod particle_filter;
mod resampling;

pub use association::Association;
pub use bayesian_filter::BayesianFilter;
pub use particle_filter::{Particle, ParticleFilter, ParticleFilterConfig};
pub use resampling::ResamplingScheme;
