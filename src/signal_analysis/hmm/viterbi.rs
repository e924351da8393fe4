use thiserror::Error;

use super::hmm_matrices::{MatrixValidationError, ProbabilityMatrix, StartMatrix, TransitionMatrix};
use super::hmm_tools::{safe_ln, StateMatrix2D};
use super::observations::ObservationMatrix;
use super::probability_matrices::{compute_log_emissions, log_transition_matrix};
use super::state::*;

pub struct Viterbi<'a> {
    states: &'a [State],
    start_matrix: &'a StartMatrix,
    transition_matrix: &'a TransitionMatrix,

    ml_path: Option<Vec<usize>>,
    log_probability: Option<f64>,
}

impl<'a> Viterbi<'a> {
    pub fn new(states: &'a [State],
        start_matrix: &'a StartMatrix,
        transition_matrix: &'a TransitionMatrix) -> Self  {

        Self {
            states,
            start_matrix,
            transition_matrix,

            ml_path: None,
            log_probability: None,
        }
    }

    // Check input validity
    pub fn pre_run_validity(&self, observations: &ObservationMatrix) -> Result<(), ViterbiError> {
        let states_dim = self.states.len();
        let start_matrix_dim = self.start_matrix.num_states();
        let transition_matrix_dim = self.transition_matrix.num_states();

        if !(states_dim == start_matrix_dim && states_dim == transition_matrix_dim) {
            return Err(ViterbiError::IncompatibleDimensions {
                dim_states: states_dim,
                dim_start_matrix: start_matrix_dim,
                dim_transition_matrix: transition_matrix_dim,
            })
        }

        if observations.num_observations() == 0 {
            return Err(ViterbiError::EmptySequence);
        }

        if let Some(state) = self.states.iter().find(|state| state.num_features() != observations.num_features()) {
            return Err(ViterbiError::FeatureMismatch { state: state.id, expected: observations.num_features(), found: state.num_features() });
        }

        // Check intrinsic validity of probability matrices
        self.start_matrix.validate().map_err(|error| ViterbiError::InvalidMatrix { error })?;
        self.transition_matrix.validate().map_err(|error| ViterbiError::InvalidMatrix { error })?;

        Ok(())
    }

    pub fn run(&mut self, observations: &ObservationMatrix) -> Result<(), ViterbiError> {
        self.pre_run_validity(observations)?;

        let states = self.states;
        let num_states = states.len();
        let num_observations = observations.num_observations();

        let mut log_emissions = StateMatrix2D::<f64>::empty((num_states, num_observations));
        compute_log_emissions(states, observations, &mut log_emissions);
        let log_transitions = log_transition_matrix(self.transition_matrix);

        let mut viterbi_log_probs = StateMatrix2D::<f64>::empty((num_states, num_observations));
        let mut backtrace_mat = StateMatrix2D::<usize>::empty((num_states, num_observations));

        /*********** Viterbi's algorithm ***********/

        // First step uses the start probabilities
        for state in states {
            viterbi_log_probs[state][0] = safe_ln(self.start_matrix[state]) + log_emissions[state][0];
        }

        for t in 1..num_observations {
            for next_state in states {
                let mut max_log_prob = f64::NEG_INFINITY;
                let mut best_prev_state: usize = 0;

                for previous_state in states {
                    let candidate = viterbi_log_probs[previous_state][t - 1] + log_transitions[previous_state.id][next_state.id];

                    // Strict comparison keeps the lowest state id on ties
                    if candidate > max_log_prob {
                        max_log_prob = candidate;
                        best_prev_state = previous_state.id;
                    }
                }

                viterbi_log_probs[next_state][t] = max_log_prob + log_emissions[next_state][t];
                backtrace_mat[next_state][t] = best_prev_state;
            }
        }

        /*********** Backtrace ***********/

        let mut last_state = 0;
        let mut max_final_log_prob = f64::NEG_INFINITY;

        for state in states {
            let final_log_prob = viterbi_log_probs[state][num_observations - 1];
            if final_log_prob > max_final_log_prob {
                max_final_log_prob = final_log_prob;
                last_state = state.id;
            }
        }

        if !max_final_log_prob.is_finite() {
            return Err(ViterbiError::NoFinitePath);
        }

        let mut ml_path = vec![0_usize; num_observations];
        ml_path[num_observations - 1] = last_state;

        // Follow the backtrace matrix backwards to get the most likely states
        let mut next_state = last_state;
        for t in (0..num_observations - 1).rev() {
            let prev_state = backtrace_mat[next_state][t + 1];
            ml_path[t] = prev_state;
            next_state = prev_state;
        }

        self.ml_path = Some(ml_path);
        self.log_probability = Some(max_final_log_prob);

        Ok(())
    }

    pub fn get_prediction(&self) -> Option<&Vec<usize>> {
        self.ml_path.as_ref()
    }

    pub fn take_prediction(&mut self) -> Option<Vec<usize>> {
        self.ml_path.take()
    }

    pub fn get_log_probability(&self) -> Option<f64> {
        self.log_probability
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViterbiError {
    #[error("dimensions do not match: {dim_states} states, start matrix {dim_start_matrix}, transition matrix {dim_transition_matrix}")]
    IncompatibleDimensions {
        dim_states: usize,
        dim_start_matrix: usize,
        dim_transition_matrix: usize,
    },
    #[error("cannot decode an empty sequence")]
    EmptySequence,
    #[error("state {state} has {found} features, observations have {expected}")]
    FeatureMismatch { state: usize, expected: usize, found: usize },
    #[error("invalid probability matrix: {error}")]
    InvalidMatrix { error: MatrixValidationError },
    #[error("every state path has zero probability")]
    NoFinitePath,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sticky_model() -> (Vec<State>, StartMatrix, TransitionMatrix) {
        let states = vec![
            State::new_1d(0, 1.0, 0.3).unwrap(),
            State::new_1d(1, 5.0, 0.3).unwrap(),
        ];
        let start_matrix = StartMatrix::new(vec![0.5, 0.5]);
        let transition_matrix = TransitionMatrix::new(vec![vec![0.9, 0.1], vec![0.1, 0.9]]);

        (states, start_matrix, transition_matrix)
    }

    #[test]
    fn test_viterbi_recovers_obvious_path() {
        let (states, start_matrix, transition_matrix) = sticky_model();
        let observations = ObservationMatrix::from_series(&[1.0, 1.1, 0.9, 5.0, 5.2, 4.9, 1.0]).unwrap();

        let mut viterbi = Viterbi::new(&states, &start_matrix, &transition_matrix);
        viterbi.run(&observations).unwrap();

        assert_eq!(viterbi.get_prediction().unwrap(), &vec![0, 0, 0, 1, 1, 1, 0]);
        assert!(viterbi.get_log_probability().unwrap().is_finite());
    }

    // A single noisy point inside a long run is smoothed away by sticky transitions
    #[test]
    fn test_viterbi_prefers_path_over_marginals() {
        let states = vec![
            State::new_1d(0, 0.0, 1.0).unwrap(),
            State::new_1d(1, 2.0, 1.0).unwrap(),
        ];
        let start_matrix = StartMatrix::new(vec![0.5, 0.5]);
        let transition_matrix = TransitionMatrix::new(vec![vec![0.99, 0.01], vec![0.01, 0.99]]);
        let observations = ObservationMatrix::from_series(&[0.0, 0.1, 1.2, 0.0, -0.1]).unwrap();

        let mut viterbi = Viterbi::new(&states, &start_matrix, &transition_matrix);
        viterbi.run(&observations).unwrap();

        assert_eq!(viterbi.take_prediction().unwrap(), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_viterbi_single_observation() {
        let (states, start_matrix, transition_matrix) = sticky_model();
        let observations = ObservationMatrix::from_series(&[5.1]).unwrap();

        let mut viterbi = Viterbi::new(&states, &start_matrix, &transition_matrix);
        viterbi.run(&observations).unwrap();

        assert_eq!(viterbi.get_prediction().unwrap(), &vec![1]);
    }

    #[test]
    fn test_viterbi_rejects_feature_mismatch() {
        let (states, start_matrix, transition_matrix) = sticky_model();
        let observations = ObservationMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();

        let mut viterbi = Viterbi::new(&states, &start_matrix, &transition_matrix);
        assert_eq!(
            viterbi.run(&observations),
            Err(ViterbiError::FeatureMismatch { state: 0, expected: 2, found: 1 })
        );
    }

    #[test]
    fn test_viterbi_rejects_incompatible_dimensions() {
        let (states, _, transition_matrix) = sticky_model();
        let start_matrix = StartMatrix::new(vec![0.2, 0.3, 0.5]);
        let observations = ObservationMatrix::from_series(&[1.0]).unwrap();

        let mut viterbi = Viterbi::new(&states, &start_matrix, &transition_matrix);
        assert!(matches!(viterbi.run(&observations), Err(ViterbiError::IncompatibleDimensions { .. })));
    }
}
