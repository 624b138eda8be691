//! Fuel-constrained collision avoidance maneuvers.
//!
//! A maneuver is a single impulsive delta-v applied to the primary at the
//! current epoch. Its effect at the time of closest approach uses a linear
//! forward model:
//!
//! ```text
//! v'      = v_a + Δv / 1000            (Δv in m/s, v in km/s)
//! r_a(T)  = r_a + v' · T
//! miss    = ‖r_a(T) − r_b(T)‖          (r_b(T) from the trajectory sampler)
//! ```
//!
//! The planner minimizes `fuel · ‖Δv‖ − safety · miss` subject to
//! `‖Δv‖ ≤ max_delta_v` and `miss ≥ 25 km`.
//!
//! Δv components are reported as (radial, along-track, cross-track) but are
//! added to the inertial velocity as given.
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::optimizer::{minimize, Problem, SolveError, SolverSettings};
use crate::propagator::StateVector;
use crate::sampler::TrajectorySampler;
use crate::trajectory::{distance, norm, scale, ObjectId};

/// Relative cost of fuel versus separation.
///
/// Deserialization goes through [`ManeuverWeights::new`], so a decoded value
/// is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct ManeuverWeights {
    fuel: f64,
    safety: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    fuel: f64,
    safety: f64,
}

impl TryFrom<RawWeights> for ManeuverWeights {
    type Error = Error;

    fn try_from(raw: RawWeights) -> Result<Self> {
        ManeuverWeights::new(raw.fuel, raw.safety)
    }
}

impl ManeuverWeights {
    /// Both weights must be finite and non-negative, and not both zero.
    pub fn new(fuel: f64, safety: f64) -> Result<Self> {
        if !fuel.is_finite() || !safety.is_finite() || fuel < 0.0 || safety < 0.0 {
            return Err(Error::invalid(format!(
                "maneuver weights must be finite and non-negative, got fuel={fuel}, safety={safety}"
            )));
        }
        if fuel == 0.0 && safety == 0.0 {
            return Err(Error::invalid("maneuver weights cannot both be zero"));
        }
        Ok(ManeuverWeights { fuel, safety })
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn safety(&self) -> f64 {
        self.safety
    }
}

/// Preset weightings offered to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManeuverStrategy {
    FuelEfficient,
    MaximumSafety,
    Balanced,
}

impl ManeuverStrategy {
    /// Presentation order of the generated options.
    pub const ALL: [ManeuverStrategy; 3] = [
        ManeuverStrategy::FuelEfficient,
        ManeuverStrategy::MaximumSafety,
        ManeuverStrategy::Balanced,
    ];

    pub fn weights(self) -> ManeuverWeights {
        let (fuel, safety) = match self {
            ManeuverStrategy::FuelEfficient => (0.7, 0.3),
            ManeuverStrategy::MaximumSafety => (0.1, 0.9),
            ManeuverStrategy::Balanced => (0.5, 0.5),
        };
        ManeuverWeights { fuel, safety }
    }

    pub fn name(self) -> &'static str {
        match self {
            ManeuverStrategy::FuelEfficient => "Fuel-Efficient",
            ManeuverStrategy::MaximumSafety => "Maximum-Safety",
            ManeuverStrategy::Balanced => "Balanced",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ManeuverStrategy::FuelEfficient => "Smallest burn that still clears the separation floor",
            ManeuverStrategy::MaximumSafety => "Largest separation the delta-v budget allows",
            ManeuverStrategy::Balanced => "Equal weight on fuel and separation",
        }
    }
}

impl fmt::Display for ManeuverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometry of one predicted conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    /// Primary (maneuvering) object now.
    pub primary: StateVector,
    /// Secondary object now.
    pub secondary: StateVector,
    /// Secondary at the time of closest approach.
    pub secondary_at_closest: StateVector,
    /// Minutes from now to closest approach.
    pub minutes_to_closest: f64,
}

impl Encounter {
    pub fn new(
        primary: StateVector,
        secondary: StateVector,
        secondary_at_closest: StateVector,
        minutes_to_closest: f64,
    ) -> Self {
        Encounter {
            primary,
            secondary,
            secondary_at_closest,
            minutes_to_closest,
        }
    }

    /// Query the sampler for both objects at `epoch` and for the secondary
    /// at `epoch + minutes_to_closest`.
    pub fn from_sampler(
        sampler: &dyn TrajectorySampler,
        primary_id: ObjectId,
        secondary_id: ObjectId,
        epoch: f64,
        minutes_to_closest: f64,
    ) -> Result<Self> {
        check_minutes(minutes_to_closest)?;
        let primary = sampler.state_at(primary_id, epoch)?;
        let secondary = sampler.state_at(secondary_id, epoch)?;
        let secondary_at_closest = sampler.state_at(secondary_id, epoch + minutes_to_closest * 60.0)?;
        Ok(Encounter::new(primary, secondary, secondary_at_closest, minutes_to_closest))
    }

    /// Predicted miss distance (km) after applying `delta_v_ms` now.
    pub fn miss_distance(&self, delta_v_ms: &[f64; 3]) -> f64 {
        let t = self.minutes_to_closest * 60.0;
        let r = self.primary.r;
        let v = self.primary.v;
        let future = [
            r[0] + (v[0] + delta_v_ms[0] / 1000.0) * t,
            r[1] + (v[1] + delta_v_ms[1] / 1000.0) * t,
            r[2] + (v[2] + delta_v_ms[2] / 1000.0) * t,
        ];
        distance(&future, &self.secondary_at_closest.r)
    }

    /// Halfway between now and closest approach.
    pub fn execution_epoch(&self) -> f64 {
        self.primary.epoch + self.minutes_to_closest * 30.0
    }

    fn validate(&self) -> Result<()> {
        check_minutes(self.minutes_to_closest)?;
        for (label, state) in [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("secondary at closest approach", &self.secondary_at_closest),
        ] {
            if !state.is_finite() {
                return Err(Error::invalid(format!("{label} state is not finite")));
            }
        }
        Ok(())
    }
}

fn check_minutes(minutes: f64) -> Result<()> {
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(Error::invalid(format!(
            "time to closest approach must be a non-negative number of minutes, got {minutes}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurnAxis {
    Radial,
    AlongTrack,
    CrossTrack,
}

impl BurnAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            BurnAxis::Radial => "radial",
            BurnAxis::AlongTrack => "along-track",
            BurnAxis::CrossTrack => "cross-track",
        }
    }
}

/// Axis of the largest |component|. Ties go to the earlier axis.
pub fn dominant_axis(delta_v_ms: &[f64; 3]) -> BurnAxis {
    let axes = [BurnAxis::Radial, BurnAxis::AlongTrack, BurnAxis::CrossTrack];
    let mut best = 0;
    for k in 1..3 {
        if delta_v_ms[k].abs() > delta_v_ms[best].abs() {
            best = k;
        }
    }
    axes[best]
}

/// An optimized avoidance maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManeuverPlan {
    /// (radial, along-track, cross-track), m/s.
    pub delta_v_ms: [f64; 3],
    pub magnitude_ms: f64,
    pub dominant_axis: BurnAxis,
    /// Predicted miss distance at closest approach (km).
    pub miss_distance_km: f64,
    /// Share of the delta-v budget left unused, percent.
    pub fuel_efficiency_pct: f64,
    pub execution_epoch: f64,
    pub weights: ManeuverWeights,
    pub iterations: usize,
    pub converged: bool,
}

/// Planner limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Per-axis bound and total magnitude limit (m/s).
    pub max_delta_v_ms: f64,
    pub max_iterations: usize,
    pub initial_guess_ms: [f64; 3],
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            max_delta_v_ms: DEFAULT_MAX_DELTA_V,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_guess_ms: DEFAULT_INITIAL_GUESS,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.max_delta_v_ms.is_finite() || self.max_delta_v_ms <= 0.0 {
            return Err(Error::invalid(format!(
                "max_delta_v_ms must be positive, got {}",
                self.max_delta_v_ms
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid("max_iterations must be at least 1"));
        }
        if self.initial_guess_ms.iter().any(|c| !c.is_finite()) {
            return Err(Error::invalid("initial_guess_ms must be finite"));
        }
        Ok(())
    }
}

/// One strategy's plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManeuverOption {
    pub strategy: ManeuverStrategy,
    pub plan: ManeuverPlan,
}

/// Stateless avoidance planner. Weights are supplied per call.
#[derive(Debug, Clone, Default)]
pub struct ManeuverPlanner {
    config: PlannerConfig,
}

impl ManeuverPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(ManeuverPlanner { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Optimize an avoidance burn for `encounter`.
    pub fn plan(&self, encounter: &Encounter, weights: ManeuverWeights) -> Result<ManeuverPlan> {
        self.solve(encounter, weights, None)
    }

    /// As [`plan`](Self::plan), but give up with
    /// [`Error::OptimizationTimeout`] once `budget` has elapsed.
    pub fn plan_within(
        &self,
        encounter: &Encounter,
        weights: ManeuverWeights,
        budget: Duration,
    ) -> Result<ManeuverPlan> {
        let deadline = Instant::now().checked_add(budget);
        self.solve(encounter, weights, deadline.map(|d| (d, budget)))
    }

    /// Plans for every [`ManeuverStrategy`], in [`ManeuverStrategy::ALL`] order.
    pub fn generate_options(&self, encounter: &Encounter) -> Result<Vec<ManeuverOption>> {
        ManeuverStrategy::ALL
            .iter()
            .map(|&strategy| {
                self.plan(encounter, strategy.weights())
                    .map(|plan| ManeuverOption { strategy, plan })
            })
            .collect()
    }

    fn solve(
        &self,
        encounter: &Encounter,
        weights: ManeuverWeights,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<ManeuverPlan> {
        encounter.validate()?;
        let weights = ManeuverWeights::new(weights.fuel, weights.safety)?;
        let max_dv = self.config.max_delta_v_ms;

        let miss = |dv: &[f64; 3]| encounter.miss_distance(dv);
        let problem = Problem::new(
            |dv: &[f64; 3]| weights.fuel * norm(dv) - weights.safety * miss(dv),
            [-max_dv; 3],
            [max_dv; 3],
        )
        .subject_to(|dv: &[f64; 3]| max_dv - norm(dv))
        .subject_to(|dv: &[f64; 3]| miss(dv) - SAFE_SEPARATION_KM);

        let settings = SolverSettings {
            max_iterations: self.config.max_iterations,
            ..SolverSettings::default()
        };

        let solution = match minimize(&problem, self.config.initial_guess_ms, &settings, deadline.map(|d| d.0)) {
            Ok(solution) => solution,
            Err(SolveError::NoFeasiblePoint { iterations, closest, .. }) => {
                let closest = [closest[0], closest[1], closest[2]];
                let best_miss_km = miss(&closest);
                warn!(best_miss_km, iterations, "no maneuver clears the separation floor");
                return Err(Error::InfeasibleManeuver {
                    best_miss_km,
                    required_km: SAFE_SEPARATION_KM,
                    iterations,
                });
            }
            Err(SolveError::DeadlineExceeded { iterations }) => {
                let budget_ms = deadline.map_or(0, |d| d.1.as_millis());
                warn!(budget_ms, iterations, "maneuver optimization ran out of time");
                return Err(Error::OptimizationTimeout { budget_ms, iterations });
            }
        };

        let delta_v_ms = solution.x;
        let magnitude_ms = norm(&delta_v_ms);
        let plan = ManeuverPlan {
            delta_v_ms,
            magnitude_ms,
            dominant_axis: dominant_axis(&delta_v_ms),
            miss_distance_km: miss(&delta_v_ms),
            fuel_efficiency_pct: (1.0 - magnitude_ms / max_dv) * 100.0,
            execution_epoch: encounter.execution_epoch(),
            weights,
            iterations: solution.iterations,
            converged: solution.converged,
        };

        if !plan.converged {
            warn!(iterations = plan.iterations, "accepting best feasible point before convergence");
        }
        info!(
            magnitude_ms = plan.magnitude_ms,
            miss_km = plan.miss_distance_km,
            axis = plan.dominant_axis.as_str(),
            "maneuver planned"
        );
        Ok(plan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BurnKind {
    Primary,
    Correction,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Burn {
    pub kind: BurnKind,
    pub epoch: f64,
    pub delta_v_ms: [f64; 3],
    pub duration_s: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnSchedule {
    pub burns: Vec<Burn>,
}

impl BurnSchedule {
    /// Componentwise sum of all burns.
    pub fn total_delta_v(&self) -> [f64; 3] {
        self.burns.iter().fold([0.0; 3], |acc, b| {
            [acc[0] + b.delta_v_ms[0], acc[1] + b.delta_v_ms[1], acc[2] + b.delta_v_ms[2]]
        })
    }
}

/// Split large burns into a primary burn ten minutes early plus a
/// correction at the execution epoch; execute small ones in one go.
pub fn build_burn_schedule(plan: &ManeuverPlan) -> BurnSchedule {
    let dv = plan.delta_v_ms;
    let burns = if plan.magnitude_ms > SPLIT_BURN_THRESHOLD {
        vec![
            Burn {
                kind: BurnKind::Primary,
                epoch: plan.execution_epoch - PRIMARY_BURN_LEAD_S,
                delta_v_ms: scale(&dv, PRIMARY_BURN_FRACTION),
                duration_s: PRIMARY_BURN_DURATION_S,
            },
            Burn {
                kind: BurnKind::Correction,
                epoch: plan.execution_epoch,
                delta_v_ms: scale(&dv, 1.0 - PRIMARY_BURN_FRACTION),
                duration_s: CORRECTION_BURN_DURATION_S,
            },
        ]
    } else {
        vec![Burn {
            kind: BurnKind::Single,
            epoch: plan.execution_epoch,
            delta_v_ms: dv,
            duration_s: (SINGLE_BURN_SECONDS_PER_MS * plan.magnitude_ms).round() as u32,
        }]
    };
    BurnSchedule { burns }
}
