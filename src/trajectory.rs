//! Sampled trajectories and the small amount of ℝ³ arithmetic the crate needs.
use serde::{Deserialize, Serialize};

use crate::propagator::StateVector;

/// Catalog identifier of a tracked object (NORAD number for TLE sources).
pub type ObjectId = u32;

/// One position/velocity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Seconds since J2000.
    pub epoch: f64,
    /// Position (km), inertial frame.
    pub position: [f64; 3],
    /// Velocity (km/s), inertial frame.
    pub velocity: [f64; 3],
}

impl From<StateVector> for TrajectorySample {
    fn from(sv: StateVector) -> Self {
        TrajectorySample {
            epoch: sv.epoch,
            position: sv.r,
            velocity: sv.v,
        }
    }
}

impl From<TrajectorySample> for StateVector {
    fn from(s: TrajectorySample) -> Self {
        StateVector::new(s.position, s.velocity, s.epoch)
    }
}

/// Fixed-step sample sequence of one object over one window.
///
/// Produced wholesale by a sampler; a fresh propagation replaces it rather
/// than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    object_id: ObjectId,
    step_minutes: u32,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(object_id: ObjectId, step_minutes: u32, samples: Vec<TrajectorySample>) -> Self {
        Self {
            object_id,
            step_minutes,
            samples,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Spacing between consecutive samples (minutes).
    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// A copy holding only the first `len` samples.
    pub fn truncated(&self, len: usize) -> Trajectory {
        Trajectory {
            object_id: self.object_id,
            step_minutes: self.step_minutes,
            samples: self.samples.iter().take(len).copied().collect(),
        }
    }
}

pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Euclidean distance between two points.
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm(&sub(a, b))
}

pub fn scale(a: &[f64; 3], k: f64) -> [f64; 3] {
    [a[0] * k, a[1] * k, a[2] * k]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(t: f64, x: f64) -> TrajectorySample {
        TrajectorySample {
            epoch: t,
            position: [x, 0.0, 0.0],
            velocity: [0.0, 7.5, 0.0],
        }
    }

    #[test]
    fn test_truncated_keeps_prefix() {
        let traj = Trajectory::new(7, 5, (0..10).map(|i| sample(i as f64 * 300.0, i as f64)).collect());
        let short = traj.truncated(4);
        assert_eq!(short.len(), 4);
        assert_eq!(short.step_minutes(), 5);
        assert_eq!(short.object_id(), 7);
        assert_eq!(short.samples(), &traj.samples()[..4]);
        // Asking for more than exists keeps everything
        assert_eq!(traj.truncated(50).len(), 10);
    }

    #[test]
    fn test_vector_helpers() {
        assert_relative_eq!(distance(&[1.0, 2.0, 2.0], &[0.0, 0.0, 0.0]), 3.0);
        assert_relative_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, -5.0, 6.0]), 12.0);
        assert_eq!(scale(&[1.0, -2.0, 0.5], 2.0), [2.0, -4.0, 1.0]);
    }

    #[test]
    fn test_state_roundtrip_through_sample() {
        let sv = StateVector::new([7000.0, 1.0, 2.0], [0.1, 7.5, 0.2], 42.0);
        let s: TrajectorySample = sv.into();
        assert_eq!(StateVector::from(s), sv);
    }
}
