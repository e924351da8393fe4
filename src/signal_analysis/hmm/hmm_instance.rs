use std::collections::HashSet;

use thiserror::Error;

use super::hmm_matrices::*;
use super::hmm_tools::StateMatrix2D;
use super::observations::ObservationMatrix;
use super::probability_matrices::*;
use super::state::*;
use super::viterbi::*;

// One set of HMM parameters evaluated against one observation matrix
pub struct HMMInstance<'a> {
    states: &'a [State],
    start_matrix: &'a StartMatrix,
    transition_matrix: &'a TransitionMatrix,

    log_emissions: Option<StateMatrix2D<f64>>, // ln P(o_t | state i)
    log_alphas: Option<StateMatrix2D<f64>>, // ln P(o_0..o_t, state_t = i)
    log_betas: Option<StateMatrix2D<f64>>, // ln P(o_t+1..o_T-1 | state_t = i)
    gammas: Option<StateMatrix2D<f64>>, // P(state_t = i | all observations)
    expected_transitions: Option<StateMatrix2D<f64>>, // Sum over t of P(state_t = i, state_t+1 = j | all observations)
    log_likelihood: Option<f64>, // ln P(observations | model)
}

impl<'a> HMMInstance<'a> {
    pub fn new(states: &'a [State],
        start_matrix: &'a StartMatrix,
        transition_matrix: &'a TransitionMatrix) -> Self  {

        Self {
            states,
            start_matrix,
            transition_matrix,

            log_emissions: None,
            log_alphas: None,
            log_betas: None,
            gammas: None,
            expected_transitions: None,
            log_likelihood: None,
        }
    }

    pub fn check_start_matrix_validity(
        start_matrix: &StartMatrix,
        num_states: usize,
    ) -> Result<(), HMMInstanceError> {
        if start_matrix.num_states() != num_states {
            return Err(HMMInstanceError::IncompatibleDimensions {
                dim_states: num_states,
                dim_matrix: start_matrix.num_states(),
            });
        }

        start_matrix
            .validate()
            .map_err(|error| HMMInstanceError::InvalidMatrix { error })?;

        Ok(())
    }

    pub fn check_transition_matrix_validity(
        transition_matrix: &TransitionMatrix,
        num_states: usize,
    ) -> Result<(), HMMInstanceError> {
        if transition_matrix.num_states() != num_states {
            return Err(HMMInstanceError::IncompatibleDimensions {
                dim_states: num_states,
                dim_matrix: transition_matrix.num_states(),
            });
        }

        transition_matrix
            .validate()
            .map_err(|error| HMMInstanceError::InvalidMatrix { error })?;

        Ok(())
    }

    // State ids must be exactly 0..N and every emission must share one dimension
    pub fn check_states_validity(states: &[State]) -> Result<(), HMMInstanceError> {
        if states.is_empty() {
            return Err(HMMInstanceError::NoStates);
        }

        let mut state_ids: HashSet<usize> = HashSet::new();
        let num_features = states[0].num_features();

        for state in states {
            if !state_ids.insert(state.id) {
                return Err(HMMInstanceError::DuplicateStateId { id: state.id });
            }

            if state.num_features() != num_features {
                return Err(HMMInstanceError::InconsistentFeatureCount { id: state.id });
            }
        }

        let expected_ids: Vec<usize> = (0..states.len()).collect();
        let mut actual_ids: Vec<usize> = state_ids.into_iter().collect();
        actual_ids.sort_unstable();

        if actual_ids != expected_ids {
            return Err(HMMInstanceError::InvalidStateIdSequence {
                expected: expected_ids,
                found: actual_ids,
            });
        }

        Ok(())
    }

    pub fn check_observations_validity(observations: &ObservationMatrix, num_features: usize) -> Result<(), HMMInstanceError> {
        if observations.num_observations() == 0 {
            return Err(HMMInstanceError::EmptySequence);
        }

        if observations.num_features() != num_features {
            return Err(HMMInstanceError::FeatureMismatch {
                expected: num_features,
                found: observations.num_features(),
            });
        }

        Ok(())
    }

    pub fn check_validity(
        states: &[State],
        start_matrix: &StartMatrix,
        transition_matrix: &TransitionMatrix,
    ) -> Result<(), HMMInstanceError> {
        Self::check_states_validity(states)?;
        Self::check_start_matrix_validity(start_matrix, states.len())?;
        Self::check_transition_matrix_validity(transition_matrix, states.len())?;

        Ok(())
    }

    pub fn run_viterbi(&self, observations: &ObservationMatrix) -> Result<(Vec<usize>, f64), HMMInstanceError> {
        Self::check_validity(self.states, self.start_matrix, self.transition_matrix)?;

        let mut viterbi = Viterbi::new(self.states, self.start_matrix, self.transition_matrix);
        viterbi.run(observations).map_err(|error| HMMInstanceError::ViterbiError { error })?;

        let log_probability = viterbi.get_log_probability().ok_or(HMMInstanceError::ViterbiOutputNotFound)?;
        let path = viterbi.take_prediction().ok_or(HMMInstanceError::ViterbiOutputNotFound)?;

        Ok((path, log_probability))
    }

    // E-step quantities: emissions, alphas, betas, gammas and summed xis
    pub fn run_all_probability_matrices(&mut self, observations: &ObservationMatrix) -> Result<(), HMMInstanceError> {
        Self::check_validity(self.states, self.start_matrix, self.transition_matrix)?;
        Self::check_observations_validity(observations, self.states[0].num_features())?;

        let num_states = self.states.len();
        let shape = (num_states, observations.num_observations());

        let mut log_emissions = StateMatrix2D::<f64>::empty(shape);
        compute_log_emissions(self.states, observations, &mut log_emissions);

        let mut log_alphas = StateMatrix2D::<f64>::empty(shape);
        let log_likelihood = compute_log_alphas(
            self.states, self.start_matrix, self.transition_matrix,
            &log_emissions, &mut log_alphas);

        if !log_likelihood.is_finite() {
            return Err(HMMInstanceError::NonFiniteLikelihood { value: log_likelihood });
        }

        let mut log_betas = StateMatrix2D::<f64>::empty(shape);
        compute_log_betas(self.states, self.transition_matrix, &log_emissions, &mut log_betas);

        let mut gammas = StateMatrix2D::<f64>::empty(shape);
        compute_gammas(self.states, &log_alphas, &log_betas, log_likelihood, &mut gammas);

        let mut expected_transitions = StateMatrix2D::<f64>::empty((num_states, num_states));
        compute_expected_transitions(
            self.states, self.transition_matrix, &log_emissions,
            &log_alphas, &log_betas, log_likelihood, &mut expected_transitions);

        self.log_emissions = Some(log_emissions);
        self.log_alphas = Some(log_alphas);
        self.log_betas = Some(log_betas);
        self.gammas = Some(gammas);
        self.expected_transitions = Some(expected_transitions);
        self.log_likelihood = Some(log_likelihood);

        Ok(())
    }

    pub fn get_log_alphas(&self) -> Option<&StateMatrix2D<f64>> {
        self.log_alphas.as_ref()
    }

    pub fn get_log_betas(&self) -> Option<&StateMatrix2D<f64>> {
        self.log_betas.as_ref()
    }

    pub fn get_gammas(&self) -> Option<&StateMatrix2D<f64>> {
        self.gammas.as_ref()
    }

    pub fn take_gammas(&mut self) -> Option<StateMatrix2D<f64>> {
        self.gammas.take()
    }

    pub fn get_expected_transitions(&self) -> Option<&StateMatrix2D<f64>> {
        self.expected_transitions.as_ref()
    }

    pub fn take_expected_transitions(&mut self) -> Option<StateMatrix2D<f64>> {
        self.expected_transitions.take()
    }

    pub fn get_log_likelihood(&self) -> Option<f64> {
        self.log_likelihood
    }
}


#[derive(Debug, Clone, PartialEq, Error)]
pub enum HMMInstanceError {
    #[error("model has no states")]
    NoStates,
    #[error("matrix has dimension {dim_matrix}, model has {dim_states} states")]
    IncompatibleDimensions { dim_states: usize, dim_matrix: usize },
    #[error("invalid probability matrix: {error}")]
    InvalidMatrix { error: MatrixValidationError },
    #[error("state id {id} is repeated")]
    DuplicateStateId { id: usize },
    #[error("state {id} has a different number of features than state 0")]
    InconsistentFeatureCount { id: usize },
    #[error("state ids must be {expected:?}, found {found:?}")]
    InvalidStateIdSequence { expected: Vec<usize>, found: Vec<usize> },
    #[error("observation sequence is empty")]
    EmptySequence,
    #[error("observations have {found} features, states have {expected}")]
    FeatureMismatch { expected: usize, found: usize },
    #[error("log-likelihood is not finite: {value}")]
    NonFiniteLikelihood { value: f64 },
    #[error("viterbi failed: {error}")]
    ViterbiError { error: ViterbiError },
    #[error("viterbi produced no output")]
    ViterbiOutputNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> (Vec<State>, StartMatrix, TransitionMatrix) {
        let states = vec![
            State::new_1d(0, 10.0, 1.0).unwrap(),
            State::new_1d(1, 20.0, 2.0).unwrap(),
        ];
        (states, StartMatrix::new(vec![0.5, 0.5]), TransitionMatrix::new(vec![vec![0.8, 0.2], vec![0.3, 0.7]]))
    }

    #[test]
    fn test_check_states_duplicate_id() {
        let states = vec![
            State::new_1d(0, 10.0, 1.0).unwrap(),
            State::new_1d(0, 20.0, 1.0).unwrap(),
        ];
        assert_eq!(HMMInstance::check_states_validity(&states), Err(HMMInstanceError::DuplicateStateId { id: 0 }));
    }

    #[test]
    fn test_check_states_id_gap() {
        let states = vec![
            State::new_1d(0, 10.0, 1.0).unwrap(),
            State::new_1d(2, 20.0, 1.0).unwrap(),
        ];
        assert!(matches!(
            HMMInstance::check_states_validity(&states),
            Err(HMMInstanceError::InvalidStateIdSequence { .. })
        ));
    }

    #[test]
    fn test_run_all_probability_matrices() {
        let (states, start_matrix, transition_matrix) = model();
        let observations = ObservationMatrix::from_series(&[10.2, 9.5, 19.0, 21.0, 20.5]).unwrap();

        let mut instance = HMMInstance::new(&states, &start_matrix, &transition_matrix);
        instance.run_all_probability_matrices(&observations).unwrap();

        assert!(instance.get_log_likelihood().unwrap().is_finite());
        let gammas = instance.get_gammas().unwrap();
        assert_eq!(gammas.shape(), (2, 5));
        assert!(gammas[0][0] > 0.99);
        assert!(gammas[1][4] > 0.99);

        let expected_transitions = instance.get_expected_transitions().unwrap();
        assert!(expected_transitions[0][1] > 0.9);
    }

    #[test]
    fn test_feature_mismatch_is_reported() {
        let (states, start_matrix, transition_matrix) = model();
        let observations = ObservationMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();

        let mut instance = HMMInstance::new(&states, &start_matrix, &transition_matrix);
        assert_eq!(
            instance.run_all_probability_matrices(&observations),
            Err(HMMInstanceError::FeatureMismatch { expected: 1, found: 2 })
        );
    }

    #[test]
    fn test_run_viterbi() {
        let (states, start_matrix, transition_matrix) = model();
        let observations = ObservationMatrix::from_series(&[10.0, 20.0, 20.0]).unwrap();

        let instance = HMMInstance::new(&states, &start_matrix, &transition_matrix);
        let (path, log_probability) = instance.run_viterbi(&observations).unwrap();

        assert_eq!(path, vec![0, 1, 1]);
        assert!(log_probability < 0.0);
    }
}
