use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signal_analysis::hmm::baum_welch::{DEFAULT_COVARS_PRIOR, DEFAULT_MIN_COVAR};
use crate::signal_analysis::hmm::decoder::{DecodeError, DecoderSetup, DEFAULT_KMEANS_NUM_TRIES, DEFAULT_MAX_ITERATIONS, DEFAULT_NUM_STATES};
use crate::signal_analysis::hmm::optimization_tracker::DEFAULT_LOG_LIKELIHOOD_TOLERANCE;
use crate::signal_analysis::hmm::state_labels::StateLabels;

const DEFAULT_HEAD_ROWS: usize = 5;

/// Settings of one analysis run, read from an optional TOML file.
///
/// Missing keys take their defaults, unknown keys are rejected:
///
/// ```toml
/// num_states = 3
/// max_iterations = 100
/// seed = 42
/// labels = ["Localized Movement", "Exploratory Movement", "Migration"]
///
/// [output]
/// directory = "out"
/// json = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub num_states: usize,
    pub max_iterations: u32,
    pub tolerance: f64,
    pub seed: Option<u64>,
    pub min_covar: f64,
    pub covars_prior: f64,
    pub kmeans_num_tries: usize,
    pub labels: StateLabels,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub json: bool,
    pub head_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            json: false,
            head_rows: DEFAULT_HEAD_ROWS,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_states: DEFAULT_NUM_STATES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_LOG_LIKELIHOOD_TOLERANCE,
            seed: None,
            min_covar: DEFAULT_MIN_COVAR,
            covars_prior: DEFAULT_COVARS_PRIOR,
            kmeans_num_tries: DEFAULT_KMEANS_NUM_TRIES,
            labels: StateLabels::movement_defaults(),
            output: OutputConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder_setup().validate().map_err(|error| ConfigError::Invalid { error })
    }

    pub fn decoder_setup(&self) -> DecoderSetup {
        DecoderSetup {
            num_states: self.num_states,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
            min_covar: self.min_covar,
            covars_prior: self.covars_prior,
            kmeans_num_tries: self.kmeans_num_tries,
            labels: self.labels.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {source}")]
    Parse { source: toml::de::Error },
    #[error("invalid config: {error}")]
    Invalid { error: DecodeError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(AnalysisConfig::from_toml_str("").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            num_states = 2
            seed = 42
            labels = ["Resting", "Roaming"]

            [output]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.num_states, 2);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.labels.label_for(1), "Roaming");
        assert!(config.output.json);
        assert_eq!(config.output.head_rows, 5);

        let setup = config.decoder_setup();
        assert_eq!(setup.num_states, 2);
        assert_eq!(setup.seed, Some(42));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(AnalysisConfig::from_toml_str("n_states = 3"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(AnalysisConfig::from_toml_str("num_states = 0"), Err(ConfigError::Invalid { .. })));
        assert!(matches!(AnalysisConfig::from_toml_str("min_covar = -1.0"), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_iterations = 25").unwrap();

        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.max_iterations, 25);
    }
}
