//! Landmark based Monte Carlo localization.
//!
//! A [`localization::ParticleFilter`] tracks the pose [x, y, yaw] of a vehicle
//! moving through a map of known landmarks, from noisy velocity / yaw rate
//! commands and noisy observations of those landmarks in the vehicle frame.

pub mod data;
pub mod error;
pub mod localization;
pub mod models;
pub mod utils;

pub use error::{FilterError, Result};
