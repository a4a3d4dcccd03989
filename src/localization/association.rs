use nalgebra::{Vector2, Vector3};

use crate::data::map::{Landmark, LandmarkMap};
use crate::models::measurement::MeasurementModel;

/// Landmark matched to one observation, with the map position used for the match.
///
/// `landmark_id` is `None` when no landmark was in sensor range; the position is
/// then the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub landmark_id: Option<u32>,
    pub x: f64,
    pub y: f64,
}

impl Association {
    pub fn new(landmark_id: u32, x: f64, y: f64) -> Association {
        Association {
            landmark_id: Some(landmark_id),
            x,
            y,
        }
    }

    pub fn unmatched() -> Association {
        Association {
            landmark_id: None,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<&Landmark> for Association {
    fn from(lm: &Landmark) -> Self {
        Association::new(lm.id, lm.x, lm.y)
    }
}

/// Landmarks within `sensor_range` of the pose, in map order.
pub fn landmarks_in_range<'a>(
    map: &'a LandmarkMap,
    x: &Vector3<f64>,
    sensor_range: f64,
) -> Vec<&'a Landmark> {
    let range2 = sensor_range * sensor_range;
    map.iter()
        .filter(|lm| (lm.position() - x.xy()).norm_squared() <= range2)
        .collect()
}

/// Closest candidate by squared distance, the first one listed wins ties.
pub fn nearest_landmark<'a>(
    candidates: &[&'a Landmark],
    z_map: &Vector2<f64>,
) -> Option<&'a Landmark> {
    let mut best: Option<(&Landmark, f64)> = None;
    for &lm in candidates {
        let d2 = (lm.position() - z_map).norm_squared();
        match best {
            Some((_, best_d2)) if d2 >= best_d2 => {}
            _ => best = Some((lm, d2)),
        }
    }
    best.map(|(lm, _)| lm)
}

/// Log importance weight of one pose hypothesis and the associations behind it.
///
/// Each observation is moved to the map frame, matched to its nearest landmark
/// in range and adds its log likelihood. No observations gives 0, a weight of 1.
pub fn weigh(
    x: &Vector3<f64>,
    observations: &[Vector2<f64>],
    map: &LandmarkMap,
    sensor_range: f64,
    measurement_model: &dyn MeasurementModel,
) -> (f64, Vec<Association>) {
    let candidates = landmarks_in_range(map, x, sensor_range);
    let mut log_weight = 0.0;
    let mut associations = Vec::with_capacity(observations.len());
    for z in observations {
        let z_map = measurement_model.to_map_frame(x, z);
        let association = nearest_landmark(&candidates, &z_map)
            .map(Association::from)
            .unwrap_or_else(Association::unmatched);
        log_weight += measurement_model.log_likelihood(&z_map, &association.position());
        associations.push(association);
    }
    (log_weight, associations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::measurement::CartesianMeasurementModel;
    use assert_approx_eq::assert_approx_eq;

    fn triangle_map() -> LandmarkMap {
        LandmarkMap::new(vec![
            Landmark::new(1, 0.0, 0.0),
            Landmark::new(2, 10.0, 0.0),
            Landmark::new(3, 0.0, 10.0),
        ])
        .unwrap()
    }

    fn model() -> CartesianMeasurementModel {
        CartesianMeasurementModel::new(&Vector2::new(0.3, 0.3)).unwrap()
    }

    #[test]
    fn culling_keeps_landmarks_on_the_boundary() {
        let map = triangle_map();
        let ids: Vec<u32> = landmarks_in_range(&map, &Vector3::zeros(), 10.0)
            .iter()
            .map(|lm| lm.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let ids: Vec<u32> = landmarks_in_range(&map, &Vector3::new(9.0, 0.0, 0.0), 2.0)
            .iter()
            .map(|lm| lm.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn nearest_neighbour_selects_closest_landmark() {
        let map = triangle_map();
        let (_, associations) = weigh(
            &Vector3::zeros(),
            &[Vector2::new(9.9, 0.2)],
            &map,
            50.0,
            &model(),
        );
        assert_eq!(associations, vec![Association::new(2, 10.0, 0.0)]);
    }

    #[test]
    fn ties_go_to_first_in_map_order() {
        let map = triangle_map();
        let candidates: Vec<&Landmark> = map.iter().collect();
        let lm = nearest_landmark(&candidates, &Vector2::new(5.0, 5.0)).unwrap();
        // (5, 5) is equidistant from all three
        assert_eq!(lm.id, 1);
    }

    #[test]
    fn observations_follow_the_pose_hypothesis() {
        let map = triangle_map();
        // facing +y, an observation straight ahead lands on (0, 10)
        let x = Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let (_, associations) = weigh(&x, &[Vector2::new(10.0, 0.0)], &map, 50.0, &model());
        assert_eq!(associations[0].landmark_id, Some(3));
    }

    #[test]
    fn no_observations_means_neutral_weight() {
        let map = triangle_map();
        let (log_w, associations) = weigh(&Vector3::zeros(), &[], &map, 50.0, &model());
        assert_eq!(log_w, 0.0);
        assert!(associations.is_empty());
    }

    #[test]
    fn nothing_in_range_matches_the_origin() {
        let map = triangle_map();
        let m = model();
        let x = Vector3::new(100.0, 100.0, 0.0);
        let z = Vector2::new(1.0, 0.0);
        let (log_w, associations) = weigh(&x, &[z], &map, 5.0, &m);
        assert_eq!(associations, vec![Association::unmatched()]);
        let expected = m.log_likelihood(&Vector2::new(101.0, 100.0), &Vector2::zeros());
        assert_eq!(log_w, expected);
        assert!(log_w.is_finite());
    }

    #[test]
    fn weight_is_product_of_likelihoods() {
        let map = triangle_map();
        let m = model();
        let x = Vector3::zeros();
        let zs = [Vector2::new(10.2, 0.0), Vector2::new(0.0, 9.7)];
        let (log_w, _) = weigh(&x, &zs, &map, 50.0, &m);
        let expected = m.log_likelihood(&zs[0], &Vector2::new(10.0, 0.0)).exp()
            * m.log_likelihood(&zs[1], &Vector2::new(0.0, 10.0)).exp();
        assert_approx_eq!(log_w.exp(), expected, 1e-12);
    }

    #[test]
    fn many_sharp_observations_stay_finite() {
        let map = triangle_map();
        let m = CartesianMeasurementModel::new(&Vector2::new(0.001, 0.001)).unwrap();
        let mut zs = vec![Vector2::new(10.0, 0.0); 70];
        zs.push(Vector2::new(30.0, 0.0));
        let (log_w, associations) = weigh(&Vector3::zeros(), &zs, &map, 50.0, &m);
        assert!(log_w.is_finite());
        assert_eq!(associations.len(), 71);
    }
}
