use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::analysis::hmm_analyzer::{HMMAnalyzer, HMMAnalyzerError};
use super::baum_welch::{BaumWelch, BaumWelchError, DEFAULT_COVARS_PRIOR, DEFAULT_MIN_COVAR};
use super::hmm_instance::HMMInstanceError;
use super::initialization::hmm_initializer::{HMMInitializer, HMMInitializerError, InitialValues};
use super::initialization::init_method_structs::KMeansInit;
use super::observations::{ObservationError, ObservationMatrix};
use super::optimization_tracker::{TerminationCriterium, DEFAULT_LOG_LIKELIHOOD_TOLERANCE};
use super::state_labels::StateLabels;
use super::{StartMatrix, State, TransitionMatrix};

pub const DEFAULT_NUM_STATES: usize = 3;
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
pub const DEFAULT_KMEANS_NUM_TRIES: usize = 10;

/// Everything a single fit-and-decode run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSetup {
    pub num_states: usize,
    pub max_iterations: u32,
    pub tolerance: f64, // Absolute log-likelihood improvement that counts as converged
    pub seed: Option<u64>, // None draws a fresh seed from the OS
    pub min_covar: f64,
    pub covars_prior: f64,
    pub kmeans_num_tries: usize,
    pub labels: StateLabels,
}

impl Default for DecoderSetup {
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
        }
    }
}

impl DecoderSetup {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.num_states == 0 {
            return Err(DecodeError::InvalidSetup { reason: "number of states must be at least 1".to_string() });
        }
        if self.max_iterations == 0 {
            return Err(DecodeError::InvalidSetup { reason: "iteration cap must be at least 1".to_string() });
        }
        if !(self.tolerance >= 0.0 && self.tolerance.is_finite()) {
            return Err(DecodeError::InvalidSetup { reason: format!("tolerance must be a non-negative number, got {}", self.tolerance) });
        }
        if !(self.min_covar > 0.0 && self.min_covar.is_finite()) {
            return Err(DecodeError::InvalidSetup { reason: format!("min_covar must be positive, got {}", self.min_covar) });
        }
        if !(self.covars_prior >= 0.0 && self.covars_prior.is_finite()) {
            return Err(DecodeError::InvalidSetup { reason: format!("covars_prior must be non-negative, got {}", self.covars_prior) });
        }
        if self.kmeans_num_tries == 0 {
            return Err(DecodeError::InvalidSetup { reason: "k-means needs at least one try".to_string() });
        }

        Ok(())
    }

    fn termination_criterium(&self) -> TerminationCriterium {
        TerminationCriterium::OneStepConvergenceAbsolute {
            epsilon: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

/// Parameters after Baum-Welch, in plain vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub means: Vec<Vec<f64>>,
    pub variances: Vec<Vec<f64>>,
    pub start_probabilities: Vec<f64>,
    pub transition_probabilities: Vec<Vec<f64>>,
}

impl FittedModel {
    fn new(states: &[State], start_matrix: &StartMatrix, transition_matrix: &TransitionMatrix) -> Self {
        Self {
            means: states.iter().map(|state| state.get_mean().iter().copied().collect()).collect(),
            variances: states.iter().map(|state| state.get_variance().iter().copied().collect()).collect(),
            start_probabilities: start_matrix.matrix.clone(),
            transition_probabilities: transition_matrix.rows().clone(),
        }
    }

    pub fn num_states(&self) -> usize {
        self.means.len()
    }
}

/// Output of [`decode`]: one state id and one label per observation row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSequence {
    pub state_ids: Vec<usize>,
    pub labels: Vec<String>,
    pub log_probability: f64, // Viterbi path log-probability
    pub log_likelihood: f64, // Data log-likelihood at the last EM iteration
    pub log_likelihood_history: Vec<f64>,
    pub iterations: u32,
    pub converged: bool,
    pub state_occupancy: Vec<f64>,
    pub model: FittedModel,
}

impl DecodedSequence {
    pub fn len(&self) -> usize {
        self.state_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_ids.is_empty()
    }
}

pub struct MovementDecoder {
    setup: DecoderSetup,
}

impl MovementDecoder {
    pub fn new(setup: DecoderSetup) -> Result<Self, DecodeError> {
        setup.validate()?;
        Ok(Self { setup })
    }

    pub fn setup(&self) -> &DecoderSetup {
        &self.setup
    }

    fn initial_values(&self, observations: &ObservationMatrix, rng: &mut StdRng) -> Result<InitialValues, DecodeError> {
        let mut initializer = HMMInitializer::new(self.setup.min_covar);
        initializer
            .set_kmeans(KMeansInit::with_num_tries(self.setup.kmeans_num_tries))
            .map_err(|error| DecodeError::Initialization { error })?;

        initializer
            .get_initial_values(observations, self.setup.num_states, rng)
            .map_err(|error| DecodeError::Initialization { error })
    }

    pub fn decode(&self, observations: &ObservationMatrix) -> Result<DecodedSequence, DecodeError> {
        let num_states = self.setup.num_states;

        if observations.num_features() == 0 {
            warn!("No numerical data available to fit");
            return Err(DecodeError::NoUsableData { reason: "no numeric columns".to_string() });
        }
        if observations.num_observations() == 0 {
            warn!("No complete rows available to fit");
            return Err(DecodeError::NoUsableData { reason: "no rows left after dropping missing values".to_string() });
        }
        if observations.num_observations() < num_states {
            return Err(DecodeError::NumericalDegeneracy {
                reason: format!("{} observations cannot support {} states", observations.num_observations(), num_states),
            });
        }

        let mut rng = match self.setup.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Fitting a {}-state Gaussian HMM to {} observations with {} features",
            num_states,
            observations.num_observations(),
            observations.num_features()
        );

        // Initialization
        let InitialValues { states, start_matrix, transition_matrix } = self.initial_values(observations, &mut rng)?;

        // Baum-Welch
        let mut baum_welch = BaumWelch::new(num_states);
        baum_welch
            .set_covariance_regularization(self.setup.min_covar, self.setup.covars_prior)
            .map_err(DecodeError::from_fit_error)?;
        baum_welch.set_initial_states(states).map_err(DecodeError::from_fit_error)?;
        baum_welch.set_initial_start_matrix(start_matrix).map_err(DecodeError::from_fit_error)?;
        baum_welch.set_initial_transition_matrix(transition_matrix).map_err(DecodeError::from_fit_error)?;

        baum_welch
            .run_optimization(observations, self.setup.termination_criterium())
            .map_err(DecodeError::from_fit_error)?;

        let log_likelihood_history = baum_welch.get_log_likelihood_history().to_vec();
        let log_likelihood = baum_welch.get_log_likelihood().ok_or(DecodeError::FitOutputNotFound)?;
        let iterations = baum_welch.iterations();
        let converged = baum_welch.converged();

        let states = baum_welch.take_states().ok_or(DecodeError::FitOutputNotFound)?;
        let start_matrix = baum_welch.take_start_matrix().ok_or(DecodeError::FitOutputNotFound)?;
        let transition_matrix = baum_welch.take_transition_matrix().ok_or(DecodeError::FitOutputNotFound)?;
        let model = FittedModel::new(&states, &start_matrix, &transition_matrix);

        // Viterbi
        let mut analyzer = HMMAnalyzer::new();
        analyzer
            .setup(observations.clone(), states, start_matrix, transition_matrix)
            .map_err(DecodeError::from_analysis_error)?;
        analyzer.run().map_err(DecodeError::from_analysis_error)?;

        let log_probability = analyzer.get_log_probability().ok_or(DecodeError::FitOutputNotFound)?;
        let state_occupancy = analyzer.get_state_occupancy().cloned().ok_or(DecodeError::FitOutputNotFound)?;
        let state_ids = analyzer.take_states_sequence().ok_or(DecodeError::FitOutputNotFound)?;

        let labels = self.setup.labels.label_sequence(&state_ids);

        info!("Decoded {} time steps, Viterbi log-probability {:.4}", state_ids.len(), log_probability);

        Ok(DecodedSequence {
            state_ids,
            labels,
            log_probability,
            log_likelihood,
            log_likelihood_history,
            iterations,
            converged,
            state_occupancy,
            model,
        })
    }
}

/// Fit a Gaussian HMM to `observations` and return the labeled Viterbi path.
pub fn decode(observations: &ObservationMatrix, setup: &DecoderSetup) -> Result<DecodedSequence, DecodeError> {
    MovementDecoder::new(setup.clone())?.decode(observations)
}

/// Same as [`decode`] for a one-dimensional series.
pub fn decode_series(series: &[f64], setup: &DecoderSetup) -> Result<DecodedSequence, DecodeError> {
    let observations = ObservationMatrix::from_series(series).map_err(|error| DecodeError::InvalidObservations { error })?;
    decode(&observations, setup)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("no usable data: {reason}")]
    NoUsableData { reason: String },
    #[error("invalid decoder setup: {reason}")]
    InvalidSetup { reason: String },
    #[error("numerical degeneracy while fitting: {reason}")]
    NumericalDegeneracy { reason: String },
    #[error("invalid observations: {error}")]
    InvalidObservations { error: ObservationError },
    #[error("initialization failed: {error}")]
    Initialization { error: HMMInitializerError },
    #[error("fitting failed: {error}")]
    Fitting { error: BaumWelchError },
    #[error("decoding failed: {error}")]
    Decoding { error: HMMAnalyzerError },
    #[error("fit finished without producing parameters")]
    FitOutputNotFound,
}

impl DecodeError {
    fn from_fit_error(error: BaumWelchError) -> Self {
        match error {
            BaumWelchError::NotEnoughObservations { .. }
            | BaumWelchError::StateCollapsed { .. }
            | BaumWelchError::DegenerateState { .. }
            | BaumWelchError::HMMInstanceError { error: HMMInstanceError::NonFiniteLikelihood { .. } } => {
                DecodeError::NumericalDegeneracy { reason: error.to_string() }
            }
            other => DecodeError::Fitting { error: other },
        }
    }

    fn from_analysis_error(error: HMMAnalyzerError) -> Self {
        DecodeError::Decoding { error }
    }

    /// Conditions the caller should show as a warning rather than a crash
    pub fn is_no_data(&self) -> bool {
        matches!(self, DecodeError::NoUsableData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_analysis::hmm::state_labels::UNKNOWN_STATE;

    fn two_state_setup() -> DecoderSetup {
        DecoderSetup { num_states: 2, ..DecoderSetup::default() }.with_seed(7)
    }

    #[test]
    fn test_two_clusters_split() {
        let observations = ObservationMatrix::from_rows(&[
            vec![1.0], vec![1.1], vec![1.0], vec![5.0], vec![5.1], vec![5.2],
        ]).unwrap();

        let decoded = decode(&observations, &two_state_setup()).unwrap();

        assert_eq!(decoded.len(), 6);
        assert_eq!(decoded.state_ids[0], decoded.state_ids[1]);
        assert_eq!(decoded.state_ids[1], decoded.state_ids[2]);
        assert_eq!(decoded.state_ids[3], decoded.state_ids[4]);
        assert_eq!(decoded.state_ids[4], decoded.state_ids[5]);
        assert_ne!(decoded.state_ids[0], decoded.state_ids[3]);

        // Initial means are sorted, so the low cluster is state 0
        assert_eq!(decoded.labels[0], "Localized Movement");
        assert_eq!(decoded.labels[5], "Exploratory Movement");
        assert!(decoded.log_probability.is_finite());
        assert_eq!(decoded.state_occupancy, vec![0.5, 0.5]);
    }

    #[test]
    fn test_same_seed_same_output() {
        let series: Vec<f64> = (0..40).map(|t| if (t / 10) % 2 == 0 { 0.5 + 0.01 * t as f64 } else { 4.0 - 0.02 * t as f64 }).collect();
        let setup = DecoderSetup::default().with_seed(11);

        let first = decode_series(&series, &setup).unwrap();
        let second = decode_series(&series, &setup).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), series.len());
    }

    #[test]
    fn test_zero_columns_is_no_data() {
        let observations = ObservationMatrix::from_rows(&[vec![], vec![]]).unwrap();
        let result = decode(&observations, &two_state_setup());
        assert!(result.as_ref().is_err_and(|error| error.is_no_data()));
    }

    #[test]
    fn test_zero_rows_is_no_data() {
        let result = decode_series(&[], &two_state_setup());
        assert!(matches!(result, Err(DecodeError::NoUsableData { .. })));
    }

    #[test]
    fn test_too_few_rows_is_degenerate() {
        let result = decode_series(&[1.0, 2.0], &DecoderSetup::default().with_seed(1));
        assert!(matches!(result, Err(DecodeError::NumericalDegeneracy { .. })));
    }

    #[test]
    fn test_labels_beyond_table_are_unknown() {
        let series = [0.0, 0.1, 0.0, 10.0, 10.1, 10.0, 20.0, 20.1, 20.0, 30.0, 30.1, 30.0];
        let setup = DecoderSetup {
            num_states: 4,
            labels: StateLabels::new(vec!["Resting".to_string()]),
            ..DecoderSetup::default()
        }
        .with_seed(3);

        let decoded = decode_series(&series, &setup).unwrap();

        assert_eq!(decoded.labels.len(), series.len());
        assert_eq!(decoded.labels[0], "Resting");
        assert_eq!(decoded.labels[11], UNKNOWN_STATE);
    }

    #[test]
    fn test_invalid_setup() {
        let setup = DecoderSetup { num_states: 0, ..DecoderSetup::default() };
        assert!(matches!(MovementDecoder::new(setup), Err(DecodeError::InvalidSetup { .. })));
    }

    #[test]
    fn test_iteration_cap_respected() {
        let series: Vec<f64> = (0..30).map(|t| (t as f64 * 0.7).sin()).collect();
        let setup = DecoderSetup { num_states: 2, max_iterations: 3, ..DecoderSetup::default() }.with_seed(5);

        let decoded = decode_series(&series, &setup).unwrap();

        assert!(decoded.iterations <= 3);
        assert_eq!(decoded.log_likelihood_history.len(), decoded.iterations as usize);
    }
}
