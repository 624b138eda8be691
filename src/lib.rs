//! # Cassia
//!
//! **C**onjunction **A**ssessment and **S**afe **S**eparation **I**mpulse **A**dvisor
//!
//! Screens tracked objects for close approaches and plans fuel-constrained
//! avoidance maneuvers. Provides TLE parsing, analytical J2 sampling,
//! collision risk classification, a small constrained optimizer, and
//! burn scheduling.
//!
//! ```no_run
//! use cassia::{screen, alerts, plan_avoidance, Catalog, Config, Tle};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("cassia.toml")?;
//! let tles = Tle::parse_batch(&std::fs::read_to_string("catalog.tle")?)?;
//! let catalog = Catalog::from_tles(&tles);
//!
//! let window = config.screening.window(0.0);
//! let reports = screen(
//!     &catalog,
//!     &catalog.objects(),
//!     &window,
//!     config.probability_model(),
//!     config.screening.skip_debris_pairs,
//! )?;
//!
//! let planner = config.planner()?;
//! for report in alerts(&reports) {
//!     let avoidance = plan_avoidance(&catalog, &planner, report, window.start_epoch)?;
//!     println!("{:?}", avoidance.schedule);
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod elements;
pub mod tle;
pub mod propagator;
pub mod trajectory;
pub mod sampler;
pub mod scorer;
pub mod risk;
pub mod optimizer;
pub mod maneuver;
pub mod screening;
pub mod config;
pub mod error;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use maneuver::{
    build_burn_schedule, Burn, BurnAxis, BurnKind, BurnSchedule, Encounter, ManeuverOption, ManeuverPlan,
    ManeuverPlanner, ManeuverStrategy, ManeuverWeights, PlannerConfig,
};
pub use risk::{assess, assess_with, classify, probability, ProbabilityModel, RiskAssessment, RiskLevel};
pub use sampler::{Catalog, ObjectKind, SamplerError, TrackedObject, TrajectorySampler};
pub use scorer::{ConjunctionFeatures, LogisticScorer, ScoreProbability};
pub use screening::{alerts, plan_avoidance, screen, AvoidancePlan, PairOutcome, PairReport, ScreeningWindow};
pub use tle::Tle;
pub use trajectory::{ObjectId, Trajectory, TrajectorySample};
