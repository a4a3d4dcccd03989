use nalgebra::Vector3;

pub mod mvn;
pub mod state;

pub fn rad2deg(x: f64) -> f64 {
    const RAD2DEG_FACTOR: f64 = 180.0 / std::f64::consts::PI;
    x * RAD2DEG_FACTOR
}

/// Wrap an angle to [-pi, pi)
pub fn normalize_angle(theta: f64) -> f64 {
    (theta + std::f64::consts::PI).rem_euclid(std::f64::consts::TAU) - std::f64::consts::PI
}

/// Absolute error between a ground truth pose and an estimate, [|dx|, |dy|, |dyaw|].
///
/// Headings are compared modulo 2pi, so the yaw error lies in [0, pi].
pub fn pose_error(ground_truth: &Vector3<f64>, estimate: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(
        (ground_truth.x - estimate.x).abs(),
        (ground_truth.y - estimate.y).abs(),
        normalize_angle(ground_truth.z - estimate.z).abs(),
    )
}
