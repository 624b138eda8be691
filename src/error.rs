//! Crate-level error taxonomy.
//!
//! Geometry (distances, classification) is total on valid input and never
//! produces an error. Everything else surfaces through [`Error`].
use thiserror::Error;

use crate::config::ConfigError;
use crate::sampler::SamplerError;

/// Errors reported by the risk engine, the maneuver planner and the sweep.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty trajectory, negative time horizon, malformed weights or limits.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No delta-v within bounds reaches the safety floor.
    #[error(
        "No maneuver reaches {required_km} km separation within bounds \
         (best miss {best_miss_km:.3} km after {iterations} iterations)"
    )]
    InfeasibleManeuver {
        best_miss_km: f64,
        required_km: f64,
        iterations: usize,
    },

    /// Caller-imposed deadline expired before the optimizer finished.
    #[error("Optimization exceeded its {budget_ms} ms budget after {iterations} iterations")]
    OptimizationTimeout { budget_ms: u128, iterations: usize },

    #[error("Trajectory sampler failed: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether retrying with a larger budget may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::OptimizationTimeout { .. })
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_retryable() {
        let timeout = Error::OptimizationTimeout { budget_ms: 5, iterations: 3 };
        let infeasible = Error::InfeasibleManeuver {
            best_miss_km: 9.0,
            required_km: 25.0,
            iterations: 100,
        };
        assert!(timeout.is_retryable());
        assert!(!infeasible.is_retryable());
        assert!(!Error::invalid("empty trajectory").is_retryable());
    }

    #[test]
    fn test_infeasible_message_names_floor() {
        let err = Error::InfeasibleManeuver {
            best_miss_km: 9.0,
            required_km: 25.0,
            iterations: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("25 km"), "{msg}");
        assert!(msg.contains("9.000"), "{msg}");
    }
}
