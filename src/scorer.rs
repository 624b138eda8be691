//! Optional learned collision-probability scorer.
//!
//! The risk engine works without a scorer. When one is plugged in, its
//! score is reported next to the geometric probability and never changes
//! the risk level.
use serde::{Deserialize, Serialize};

use crate::constants::RAD2DEG;
use crate::elements::inclination_of;
use crate::trajectory::{dot, norm, sub, TrajectorySample};

/// Fixed six-feature description of a conjunction at closest approach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionFeatures {
    pub distance_km: f64,
    pub relative_velocity_km_s: f64,
    pub approach_angle_deg: f64,
    pub altitude_diff_km: f64,
    pub inclination_diff_deg: f64,
    pub time_to_closest_min: f64,
}

impl ConjunctionFeatures {
    pub const LEN: usize = 6;

    /// Features from the paired samples at the closest-approach index.
    pub fn from_samples(a: &TrajectorySample, b: &TrajectorySample, time_to_closest_min: f64) -> Self {
        let speed_a = norm(&a.velocity);
        let speed_b = norm(&b.velocity);
        let approach_angle_deg = if speed_a > 0.0 && speed_b > 0.0 {
            (dot(&a.velocity, &b.velocity) / (speed_a * speed_b))
                .clamp(-1.0, 1.0)
                .acos()
                * RAD2DEG
        } else {
            0.0
        };

        let inc_a = inclination_of(&a.position, &a.velocity);
        let inc_b = inclination_of(&b.position, &b.velocity);

        ConjunctionFeatures {
            distance_km: norm(&sub(&a.position, &b.position)),
            relative_velocity_km_s: norm(&sub(&a.velocity, &b.velocity)),
            approach_angle_deg,
            altitude_diff_km: (norm(&a.position) - norm(&b.position)).abs(),
            inclination_diff_deg: (inc_a - inc_b).abs() * RAD2DEG,
            time_to_closest_min,
        }
    }

    /// `[distance, rel. velocity, angle, altitude diff, inclination diff, time]`.
    pub fn as_array(&self) -> [f64; Self::LEN] {
        [
            self.distance_km,
            self.relative_velocity_km_s,
            self.approach_angle_deg,
            self.altitude_diff_km,
            self.inclination_diff_deg,
            self.time_to_closest_min,
        ]
    }

    pub fn from_array(x: [f64; Self::LEN]) -> Self {
        ConjunctionFeatures {
            distance_km: x[0],
            relative_velocity_km_s: x[1],
            approach_angle_deg: x[2],
            altitude_diff_km: x[3],
            inclination_diff_deg: x[4],
            time_to_closest_min: x[5],
        }
    }
}

/// A collision-probability model over [`ConjunctionFeatures`].
///
/// Implementations return a probability in `[0, 1]`; the engine clamps
/// anything outside that range.
pub trait ScoreProbability: Send + Sync {
    fn score_probability(&self, features: &ConjunctionFeatures) -> f64;
}

impl<F> ScoreProbability for F
where
    F: Fn(&ConjunctionFeatures) -> f64 + Send + Sync,
{
    fn score_probability(&self, features: &ConjunctionFeatures) -> f64 {
        self(features)
    }
}

/// Logistic model `σ(w·x + b)` with externally fitted coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticScorer {
    pub weights: [f64; ConjunctionFeatures::LEN],
    pub bias: f64,
}

impl Default for LogisticScorer {
    /// Uncalibrated coefficients: risk rises with closeness, relative speed
    /// and shallow approach angles.
    fn default() -> Self {
        LogisticScorer {
            weights: [-0.08, 0.2, -0.03, -0.005, 0.0, 0.0],
            bias: 1.0,
        }
    }
}

impl ScoreProbability for LogisticScorer {
    fn score_probability(&self, features: &ConjunctionFeatures) -> f64 {
        let x = features.as_array();
        let z: f64 = self.weights.iter().zip(x.iter()).map(|(w, x)| w * x).sum::<f64>() + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(position: [f64; 3], velocity: [f64; 3]) -> TrajectorySample {
        TrajectorySample { epoch: 0.0, position, velocity }
    }

    #[test]
    fn test_features_head_on_equatorial_vs_polar() {
        let a = sample([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0]);
        let b = sample([7003.0, 4.0, 0.0], [0.0, 0.0, 7.5]);
        let f = ConjunctionFeatures::from_samples(&a, &b, 35.0);

        assert_relative_eq!(f.distance_km, 5.0, epsilon = 1e-12);
        assert_relative_eq!(f.relative_velocity_km_s, 7.5 * 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(f.approach_angle_deg, 90.0, epsilon = 1e-9);
        assert!(f.altitude_diff_km > 3.0 && f.altitude_diff_km < 3.01);
        assert_relative_eq!(f.inclination_diff_deg, 90.0, epsilon = 0.1);
        assert_eq!(f.time_to_closest_min, 35.0);
    }

    #[test]
    fn test_features_with_stationary_object() {
        let a = sample([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0]);
        let b = sample([7000.0, 1.0, 0.0], [0.0, 0.0, 0.0]);
        let f = ConjunctionFeatures::from_samples(&a, &b, 0.0);
        assert_eq!(f.approach_angle_deg, 0.0);
        assert_eq!(f.inclination_diff_deg, 0.0);
    }

    #[test]
    fn test_array_order() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(ConjunctionFeatures::from_array(x).as_array(), x);
    }

    #[test]
    fn test_logistic_scorer_bounds_and_monotonicity() {
        let scorer = LogisticScorer::default();
        let close = ConjunctionFeatures::from_array([2.0, 14.0, 5.0, 5.0, 2.0, 5.0]);
        let far = ConjunctionFeatures::from_array([90.0, 2.0, 90.0, 100.0, 30.0, 60.0]);
        let p_close = scorer.score_probability(&close);
        let p_far = scorer.score_probability(&far);
        assert!((0.0..=1.0).contains(&p_close));
        assert!((0.0..=1.0).contains(&p_far));
        assert!(p_close > p_far);
    }

    #[test]
    fn test_closures_are_scorers() {
        let constant = |_: &ConjunctionFeatures| 0.25;
        let f = ConjunctionFeatures::from_array([0.0; 6]);
        assert_eq!(constant.score_probability(&f), 0.25);
    }
}
