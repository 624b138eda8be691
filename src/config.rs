//! TOML configuration.
//!
//! ```toml
//! [screening]
//! horizon_hours = 24.0
//! step_minutes = 5
//! skip_debris_pairs = true
//!
//! [planner]
//! max_delta_v_ms = 10.0
//! max_iterations = 100
//! initial_guess_ms = [0.0, 2.0, 0.0]
//!
//! [scorer]
//! weights = [-0.08, 0.2, -0.03, -0.005, 0.0, 0.0]
//! bias = 1.0
//! ```
//!
//! Every section and field is optional. Without a `[scorer]` section the
//! risk engine uses the geometric probability only.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::maneuver::{ManeuverPlanner, PlannerConfig};
use crate::risk::ProbabilityModel;
use crate::scorer::LogisticScorer;
use crate::screening::ScreeningConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub screening: ScreeningConfig,
    pub planner: PlannerConfig,
    pub scorer: Option<LogisticScorer>,
}

impl Config {
    /// Parse and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.screening.validate().map_err(invalid)?;
        self.planner.validate().map_err(invalid)?;

        let limit = self.planner.max_delta_v_ms;
        if self.planner.initial_guess_ms.iter().any(|c| c.abs() > limit) {
            return Err(ConfigError::Invalid(format!(
                "initial_guess_ms {:?} lies outside the ±{limit} m/s bounds",
                self.planner.initial_guess_ms
            )));
        }

        if let Some(scorer) = &self.scorer {
            if !scorer.bias.is_finite() || scorer.weights.iter().any(|w| !w.is_finite()) {
                return Err(ConfigError::Invalid("scorer coefficients must be finite".into()));
            }
        }
        Ok(())
    }

    pub fn planner(&self) -> crate::error::Result<ManeuverPlanner> {
        ManeuverPlanner::new(self.planner)
    }

    /// Geometric unless a scorer is configured.
    pub fn probability_model(&self) -> ProbabilityModel<'_> {
        match &self.scorer {
            Some(scorer) => ProbabilityModel::Blended(scorer),
            None => ProbabilityModel::Geometric,
        }
    }
}

fn invalid(err: Error) -> ConfigError {
    match err {
        Error::InvalidInput(msg) => ConfigError::Invalid(msg),
        other => ConfigError::Invalid(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FULL: &str = r#"
[screening]
horizon_hours = 12.0
step_minutes = 2
skip_debris_pairs = false

[planner]
max_delta_v_ms = 8.0
max_iterations = 250
initial_guess_ms = [0.0, 1.0, 0.0]

[scorer]
weights = [-0.1, 0.2, -0.03, -0.005, 0.0, 0.0]
bias = 0.5
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert_relative_eq!(config.screening.horizon_hours, 12.0);
        assert_eq!(config.screening.step_minutes, 2);
        assert!(!config.screening.skip_debris_pairs);
        assert_relative_eq!(config.planner.max_delta_v_ms, 8.0);
        assert_eq!(config.planner.max_iterations, 250);
        assert_eq!(config.planner.initial_guess_ms, [0.0, 1.0, 0.0]);

        let scorer = config.scorer.unwrap();
        assert_relative_eq!(scorer.weights[0], -0.1);
        assert_relative_eq!(scorer.bias, 0.5);
        assert!(matches!(config.probability_model(), ProbabilityModel::Blended(_)));
        assert_relative_eq!(config.planner().unwrap().config().max_delta_v_ms, 8.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.screening.step_minutes, 5);
        assert_relative_eq!(config.planner.max_delta_v_ms, 10.0);
        assert_eq!(config.planner.max_iterations, 100);
        assert_eq!(config.planner.initial_guess_ms, [0.0, 2.0, 0.0]);
        assert!(matches!(config.probability_model(), ProbabilityModel::Geometric));
    }

    #[test]
    fn test_partial_section() {
        let config = Config::from_toml_str("[planner]\nmax_iterations = 40\n").unwrap();
        assert_eq!(config.planner.max_iterations, 40);
        assert_relative_eq!(config.planner.max_delta_v_ms, 10.0);
        assert_relative_eq!(config.screening.horizon_hours, 24.0);
    }

    #[test]
    fn test_invalid_values() {
        for text in [
            "[planner]\nmax_delta_v_ms = 0.0\n",
            "[planner]\nmax_delta_v_ms = -1.0\n",
            "[planner]\nmax_iterations = 0\n",
            "[planner]\ninitial_guess_ms = [0.0, 12.0, 0.0]\n",
            "[screening]\nstep_minutes = 0\n",
            "[screening]\nhorizon_hours = -3.0\n",
        ] {
            assert!(
                matches!(Config::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("[planner\nmax_iterations = 3"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[planner]\nmax_iterations = \"many\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("conjunction-config-{}.toml", std::process::id()));
        std::fs::write(&path, FULL).unwrap();
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.screening.step_minutes, 2);

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        let wrapped: Error = err.into();
        assert!(wrapped.to_string().starts_with("Configuration error"));
    }
}
