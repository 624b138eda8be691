//! Collision Risk Engine.
//!
//! Scans two index-paired trajectories for the closest sampled approach,
//! classifies it by fixed distance thresholds and attaches a simple
//! geometric probability:
//!
//! | distance (km) | level    |
//! |---------------|----------|
//! | `< 5`         | Critical |
//! | `< 25`        | High     |
//! | `< 50`        | Medium   |
//! | otherwise     | Low      |
//!
//! Probability is `100 · exp(-d / 10)` percent below 100 km and exactly 0
//! from 100 km on. It is a monotonic decay, not a physical conjunction
//! probability.
//!
//! Trajectories of different lengths are truncated to the shorter one and
//! paired by index, not by timestamp.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::scorer::{ConjunctionFeatures, ScoreProbability};
use crate::trajectory::{distance, Trajectory};

/// Severity of a conjunction, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// High and Critical conjunctions call for an avoidance maneuver.
    pub fn requires_maneuver(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of assessing one object pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub min_distance_km: f64,
    pub time_to_closest_minutes: u32,
    /// Sample index of closest approach (earliest on ties).
    pub closest_index: usize,
    pub risk_level: RiskLevel,
    /// Geometric probability (percent).
    pub collision_probability_pct: f64,
    /// Learned probability (percent), when a scorer was consulted.
    pub learned_probability_pct: Option<f64>,
}

/// How the engine estimates collision probability.
#[derive(Clone, Copy, Default)]
pub enum ProbabilityModel<'a> {
    /// Pure geometric decay.
    #[default]
    Geometric,
    /// Geometric decay plus a learned score inside the 100 km cutoff.
    Blended(&'a dyn ScoreProbability),
}

impl std::fmt::Debug for ProbabilityModel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbabilityModel::Geometric => f.write_str("Geometric"),
            ProbabilityModel::Blended(_) => f.write_str("Blended(..)"),
        }
    }
}

/// Severity for a miss distance (km).
pub fn classify(distance_km: f64) -> RiskLevel {
    if distance_km < CRITICAL_DISTANCE_KM {
        RiskLevel::Critical
    } else if distance_km < HIGH_DISTANCE_KM {
        RiskLevel::High
    } else if distance_km < MEDIUM_DISTANCE_KM {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Geometric collision probability (percent) for a miss distance (km).
pub fn probability(distance_km: f64) -> f64 {
    if distance_km >= PROBABILITY_CUTOFF_KM {
        return 0.0;
    }
    100.0 * (-distance_km / PROBABILITY_SCALE_KM).exp()
}

/// Assess a pair with the geometric probability model.
pub fn assess(a: &Trajectory, b: &Trajectory) -> Result<RiskAssessment> {
    assess_with(a, b, ProbabilityModel::Geometric)
}

/// Assess a pair, optionally consulting a learned scorer.
pub fn assess_with(a: &Trajectory, b: &Trajectory, model: ProbabilityModel<'_>) -> Result<RiskAssessment> {
    if a.is_empty() || b.is_empty() {
        return Err(Error::invalid(format!(
            "cannot assess objects {} and {}: trajectory is empty ({} and {} samples)",
            a.object_id(),
            b.object_id(),
            a.len(),
            b.len()
        )));
    }
    if a.step_minutes() != b.step_minutes() {
        return Err(Error::invalid(format!(
            "step sizes differ: {} min vs {} min",
            a.step_minutes(),
            b.step_minutes()
        )));
    }

    let n = a.len().min(b.len());
    let (closest_index, min_distance_km) = a.samples()[..n]
        .iter()
        .zip(&b.samples()[..n])
        .map(|(sa, sb)| distance(&sa.position, &sb.position))
        .enumerate()
        // Strict `<` keeps the earliest index on ties
        .fold((0, f64::INFINITY), |best, (k, d)| if d < best.1 { (k, d) } else { best });

    let time_to_closest_minutes = u32::try_from(closest_index)
        .ok()
        .and_then(|k| k.checked_mul(a.step_minutes()))
        .ok_or_else(|| {
            Error::invalid(format!(
                "time to closest approach overflows: sample {closest_index} at {} min steps",
                a.step_minutes()
            ))
        })?;
    let risk_level = classify(min_distance_km);

    let learned_probability_pct = match model {
        ProbabilityModel::Blended(scorer) if min_distance_km < PROBABILITY_CUTOFF_KM => {
            let features = ConjunctionFeatures::from_samples(
                &a.samples()[closest_index],
                &b.samples()[closest_index],
                time_to_closest_minutes as f64,
            );
            let score = scorer.score_probability(&features);
            Some(if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) * 100.0 })
        }
        _ => None,
    };

    debug!(
        primary = a.object_id(),
        secondary = b.object_id(),
        paired_samples = n,
        min_distance_km,
        time_to_closest_minutes,
        level = %risk_level,
        "assessed pair"
    );

    Ok(RiskAssessment {
        min_distance_km,
        time_to_closest_minutes,
        closest_index,
        risk_level,
        collision_probability_pct: probability(min_distance_km),
        learned_probability_pct,
    })
}
