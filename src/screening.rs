//! All-pairs conjunction screening over a catalog window.
//!
//! Every object is sampled once, then every unordered pair is assessed.
//! Both stages run in parallel. A pair whose trajectories could not be
//! produced is reported as [`PairOutcome::Unknown`] rather than guessed.
use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::maneuver::{
    build_burn_schedule, BurnSchedule, Encounter, ManeuverOption, ManeuverPlan, ManeuverPlanner, ManeuverStrategy,
};
use crate::risk::{assess_with, ProbabilityModel, RiskAssessment};
use crate::sampler::{sample_count, ObjectKind, TrackedObject, TrajectorySampler};
use crate::trajectory::Trajectory;

/// Sweep defaults, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    pub horizon_hours: f64,
    pub step_minutes: u32,
    pub skip_debris_pairs: bool,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        ScreeningConfig {
            horizon_hours: 24.0,
            step_minutes: 5,
            skip_debris_pairs: true,
        }
    }
}

impl ScreeningConfig {
    pub fn validate(&self) -> Result<()> {
        sample_count(self.horizon_hours, self.step_minutes)
            .map(|_| ())
            .map_err(|e| Error::invalid(e.to_string()))
    }

    pub fn window(&self, start_epoch: f64) -> ScreeningWindow {
        ScreeningWindow {
            start_epoch,
            horizon_hours: self.horizon_hours,
            step_minutes: self.step_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningWindow {
    pub start_epoch: f64,
    pub horizon_hours: f64,
    pub step_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairOutcome {
    Assessed(RiskAssessment),
    /// Trajectories were unavailable; no risk statement is made.
    Unknown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub primary: TrackedObject,
    pub secondary: TrackedObject,
    pub outcome: PairOutcome,
}

impl PairReport {
    pub fn assessment(&self) -> Option<&RiskAssessment> {
        match &self.outcome {
            PairOutcome::Assessed(a) => Some(a),
            PairOutcome::Unknown { .. } => None,
        }
    }
}

/// Assess every unordered pair of `objects` over `window`.
///
/// Reports come back in `(i, j)` order over the input slice, `i < j`.
pub fn screen(
    sampler: &dyn TrajectorySampler,
    objects: &[TrackedObject],
    window: &ScreeningWindow,
    model: ProbabilityModel<'_>,
    skip_debris_pairs: bool,
) -> Result<Vec<PairReport>> {
    sample_count(window.horizon_hours, window.step_minutes).map_err(|e| Error::invalid(e.to_string()))?;

    let trajectories: Vec<std::result::Result<Trajectory, String>> = objects
        .par_iter()
        .map(|object| {
            sampler
                .sample(object.id, window.start_epoch, window.horizon_hours, window.step_minutes)
                .map_err(|e| e.to_string())
        })
        .collect();

    let n = objects.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .filter(|&(i, j)| {
            !(skip_debris_pairs && objects[i].kind == ObjectKind::Debris && objects[j].kind == ObjectKind::Debris)
        })
        .collect();

    let reports: Vec<PairReport> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let outcome = match (&trajectories[i], &trajectories[j]) {
                (Ok(a), Ok(b)) => match assess_with(a, b, model) {
                    Ok(assessment) => PairOutcome::Assessed(assessment),
                    Err(e) => PairOutcome::Unknown { reason: e.to_string() },
                },
                (Err(reason), _) | (_, Err(reason)) => PairOutcome::Unknown { reason: reason.clone() },
            };
            if let PairOutcome::Unknown { reason } = &outcome {
                warn!(primary = objects[i].id, secondary = objects[j].id, %reason, "pair not assessed");
            }
            PairReport {
                primary: objects[i].clone(),
                secondary: objects[j].clone(),
                outcome,
            }
        })
        .collect();

    let unknown = reports.iter().filter(|r| r.assessment().is_none()).count();
    info!(
        objects = n,
        pairs = reports.len(),
        unknown,
        alerts = alerts(&reports).len(),
        "screening sweep complete"
    );
    Ok(reports)
}

/// Pairs that need a maneuver, most severe first, closer first on ties.
pub fn alerts(reports: &[PairReport]) -> Vec<&PairReport> {
    let mut flagged: Vec<(&PairReport, &RiskAssessment)> = reports
        .iter()
        .filter_map(|r| r.assessment().map(|a| (r, a)))
        .filter(|(_, a)| a.risk_level.requires_maneuver())
        .collect();
    flagged.sort_by(|(_, x), (_, y)| match y.risk_level.cmp(&x.risk_level) {
        Ordering::Equal => x.min_distance_km.total_cmp(&y.min_distance_km),
        other => other,
    });
    flagged.into_iter().map(|(r, _)| r).collect()
}

/// Avoidance options for one flagged pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvoidancePlan {
    pub primary: TrackedObject,
    pub secondary: TrackedObject,
    pub assessment: RiskAssessment,
    pub encounter: Encounter,
    pub options: Vec<ManeuverOption>,
    pub recommended: ManeuverStrategy,
    pub schedule: BurnSchedule,
}

impl AvoidancePlan {
    pub fn recommended_plan(&self) -> Option<&ManeuverPlan> {
        self.options
            .iter()
            .find(|o| o.strategy == self.recommended)
            .map(|o| &o.plan)
    }
}

/// Plan an avoidance maneuver for the primary of `report`, starting at
/// `epoch`. The Balanced option is recommended and scheduled.
pub fn plan_avoidance(
    sampler: &dyn TrajectorySampler,
    planner: &ManeuverPlanner,
    report: &PairReport,
    epoch: f64,
) -> Result<AvoidancePlan> {
    let assessment = report.assessment().ok_or_else(|| {
        Error::invalid(format!(
            "pair {}/{} has no assessment to plan against",
            report.primary.id, report.secondary.id
        ))
    })?;

    let encounter = Encounter::from_sampler(
        sampler,
        report.primary.id,
        report.secondary.id,
        epoch,
        assessment.time_to_closest_minutes as f64,
    )?;
    let options = planner.generate_options(&encounter)?;

    let recommended = ManeuverStrategy::Balanced;
    let plan = options
        .iter()
        .find(|o| o.strategy == recommended)
        .map(|o| o.plan)
        .ok_or_else(|| Error::invalid("no Balanced option was generated"))?;
    let schedule = build_burn_schedule(&plan);

    info!(
        primary = report.primary.id,
        secondary = report.secondary.id,
        burns = schedule.burns.len(),
        magnitude_ms = plan.magnitude_ms,
        "avoidance plan ready"
    );

    Ok(AvoidancePlan {
        primary: report.primary.clone(),
        secondary: report.secondary.clone(),
        assessment: assessment.clone(),
        encounter,
        options,
        recommended,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maneuver::BurnKind;
    use crate::propagator::StateVector;
    use crate::risk::RiskLevel;
    use crate::sampler::SamplerError;
    use crate::scorer::ConjunctionFeatures;
    use crate::trajectory::{ObjectId, TrajectorySample};
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    /// Straight-line motion from epoch 0.
    struct LinearSampler {
        objects: HashMap<ObjectId, ([f64; 3], [f64; 3])>,
    }

    impl TrajectorySampler for LinearSampler {
        fn sample(
            &self,
            id: ObjectId,
            start_epoch: f64,
            duration_hours: f64,
            step_minutes: u32,
        ) -> std::result::Result<Trajectory, SamplerError> {
            let count = sample_count(duration_hours, step_minutes)?;
            let samples = (0..count)
                .map(|k| {
                    self.state_at(id, start_epoch + k as f64 * step_minutes as f64 * 60.0)
                        .map(TrajectorySample::from)
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Trajectory::new(id, step_minutes, samples))
        }

        fn state_at(&self, id: ObjectId, epoch: f64) -> std::result::Result<StateVector, SamplerError> {
            let (r, v) = self.objects.get(&id).ok_or(SamplerError::UnknownObject(id))?;
            Ok(StateVector::new(
                [r[0] + v[0] * epoch, r[1] + v[1] * epoch, r[2] + v[2] * epoch],
                *v,
                epoch,
            ))
        }
    }

    // Object 2 closes on object 1 along-track and passes 20 km radially
    // outside it at t = 1200 s. Object 7 flies 3 km outside object 1.
    fn sampler() -> LinearSampler {
        let objects = HashMap::from([
            (1, ([7000.0, 0.0, 0.0], [0.0, 7.5, 0.0])),
            (2, ([7020.0, 75.0, 0.0], [0.0, 7.4375, 0.0])),
            (3, ([-7000.0, 0.0, 0.0], [0.0, 7.5, 0.0])),
            (7, ([7003.0, 0.0, 0.0], [0.0, 7.5, 0.0])),
            (5, ([0.0, 7000.0, 0.0], [7.5, 0.0, 0.0])),
            (6, ([1.0, 7000.0, 0.0], [7.5, 0.0, 0.0])),
        ]);
        LinearSampler { objects }
    }

    fn payload(id: ObjectId) -> TrackedObject {
        TrackedObject::new(id, format!("SAT-{id}"), ObjectKind::Payload)
    }

    fn debris(id: ObjectId) -> TrackedObject {
        TrackedObject::new(id, format!("SAT DEB {id}"), ObjectKind::Debris)
    }

    fn window() -> ScreeningWindow {
        ScreeningWindow {
            start_epoch: 0.0,
            horizon_hours: 1.0,
            step_minutes: 5,
        }
    }

    fn pair<'r>(reports: &'r [PairReport], a: ObjectId, b: ObjectId) -> &'r PairReport {
        reports
            .iter()
            .find(|r| r.primary.id == a && r.secondary.id == b)
            .unwrap()
    }

    #[test]
    fn test_screen_assesses_every_pair_in_order() {
        let objects = vec![payload(1), payload(2), payload(3), payload(7)];
        let reports = screen(&sampler(), &objects, &window(), ProbabilityModel::Geometric, true).unwrap();

        let order: Vec<_> = reports.iter().map(|r| (r.primary.id, r.secondary.id)).collect();
        assert_eq!(order, vec![(1, 2), (1, 3), (1, 7), (2, 3), (2, 7), (3, 7)]);

        let close = pair(&reports, 1, 2).assessment().unwrap();
        assert_relative_eq!(close.min_distance_km, 20.0, epsilon = 1e-9);
        assert_eq!(close.time_to_closest_minutes, 20);
        assert_eq!(close.closest_index, 4);
        assert_eq!(close.risk_level, RiskLevel::High);

        let far = pair(&reports, 1, 3).assessment().unwrap();
        assert_eq!(far.risk_level, RiskLevel::Low);
        assert_eq!(far.collision_probability_pct, 0.0);

        let critical = pair(&reports, 1, 7).assessment().unwrap();
        assert_eq!(critical.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_unknown_objects_are_not_coerced() {
        let objects = vec![payload(1), payload(4), payload(2)];
        let reports = screen(&sampler(), &objects, &window(), ProbabilityModel::Geometric, true).unwrap();
        assert_eq!(reports.len(), 3);

        for (a, b) in [(1, 4), (4, 2)] {
            match &pair(&reports, a, b).outcome {
                PairOutcome::Unknown { reason } => assert!(reason.contains('4')),
                other => panic!("expected unknown outcome, got {other:?}"),
            }
        }
        assert!(pair(&reports, 1, 2).assessment().is_some());
    }

    #[test]
    fn test_debris_pairs_can_be_skipped() {
        let objects = vec![payload(1), debris(5), debris(6)];
        let skipped = screen(&sampler(), &objects, &window(), ProbabilityModel::Geometric, true).unwrap();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(|r| r.primary.kind == ObjectKind::Payload));

        let all = screen(&sampler(), &objects, &window(), ProbabilityModel::Geometric, false).unwrap();
        assert_eq!(all.len(), 3);
        let debris_pair = pair(&all, 5, 6).assessment().unwrap();
        assert_relative_eq!(debris_pair.min_distance_km, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        let bad = ScreeningWindow {
            step_minutes: 0,
            ..window()
        };
        assert!(matches!(
            screen(&sampler(), &[payload(1)], &bad, ProbabilityModel::Geometric, true),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_blended_model_reaches_every_close_pair() {
        let certain = |_: &ConjunctionFeatures| 1.0;
        let objects = vec![payload(1), payload(2), payload(3)];
        let reports = screen(&sampler(), &objects, &window(), ProbabilityModel::Blended(&certain), true).unwrap();
        assert_eq!(pair(&reports, 1, 2).assessment().unwrap().learned_probability_pct, Some(100.0));
        assert_eq!(pair(&reports, 1, 3).assessment().unwrap().learned_probability_pct, None);
    }

    #[test]
    fn test_alerts_sorted_by_severity_then_distance() {
        let objects = vec![payload(1), payload(2), payload(3), payload(7)];
        let reports = screen(&sampler(), &objects, &window(), ProbabilityModel::Geometric, true).unwrap();
        let flagged: Vec<_> = alerts(&reports)
            .iter()
            .map(|r| (r.primary.id, r.secondary.id))
            .collect();
        // (1,7) critical at 3 km, then (2,7) at 17 km before (1,2) at 20 km
        assert_eq!(flagged, vec![(1, 7), (2, 7), (1, 2)]);
    }

    #[test]
    fn test_plan_avoidance_recommends_balanced() {
        let sampler = sampler();
        let objects = vec![payload(1), payload(2)];
        let reports = screen(&sampler, &objects, &window(), ProbabilityModel::Geometric, true).unwrap();
        let planner = ManeuverPlanner::default();

        let avoidance = plan_avoidance(&sampler, &planner, &reports[0], 0.0).unwrap();
        assert_eq!(avoidance.recommended, ManeuverStrategy::Balanced);
        assert_eq!(avoidance.options.len(), 3);
        assert_relative_eq!(avoidance.encounter.minutes_to_closest, 20.0);

        let plan = avoidance.recommended_plan().unwrap();
        assert!(plan.miss_distance_km >= 25.0);
        assert_relative_eq!(plan.execution_epoch, 600.0);
        assert!(plan.delta_v_ms[0] < 0.0, "should burn away from the secondary");

        // Balanced uses the whole budget here, so the burn is split
        assert_eq!(avoidance.schedule.burns.len(), 2);
        assert_eq!(avoidance.schedule.burns[0].kind, BurnKind::Primary);
        assert_relative_eq!(avoidance.schedule.burns[0].epoch, 0.0);
    }

    #[test]
    fn test_plan_avoidance_needs_an_assessment() {
        let report = PairReport {
            primary: payload(1),
            secondary: payload(4),
            outcome: PairOutcome::Unknown { reason: "missing".into() },
        };
        assert!(matches!(
            plan_avoidance(&sampler(), &ManeuverPlanner::default(), &report, 0.0),
            Err(Error::InvalidInput(_))
        ));
    }
}
