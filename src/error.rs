//! Error types for the localization crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),

    #[error("landmark id {0} appears more than once in the map")]
    DuplicateLandmark(u32),

    #[error("covariance is not positive definite")]
    CovarianceNotPositiveDefinite,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Rejects NaN and infinities.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter { name, value })
    }
}

/// Standard deviations may be zero (noise disabled) but never negative.
pub(crate) fn ensure_std_dev(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter { name, value })
    }
}

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter { name, value })
    }
}
