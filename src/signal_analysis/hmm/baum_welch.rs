use nalgebra::DVector;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::hmm_instance::*;
use super::hmm_matrices::*;
use super::hmm_tools::StateMatrix2D;
use super::observations::ObservationMatrix;
use super::optimization_tracker::{OptimizationTracker, TerminationCriterium};
use super::state::*;

pub const DEFAULT_MIN_COVAR: f64 = 1e-3;
pub const DEFAULT_COVARS_PRIOR: f64 = 1e-2;

// Occupancy denominators never go below this
const MIN_OCCUPANCY_DENOMINATOR: f64 = 1e-5;

pub struct BaumWelch {
    num_states: usize,
    min_covar: f64,
    covars_prior: f64,

    initial_states: Option<Vec<State>>,
    initial_start_matrix: Option<StartMatrix>,
    initial_transition_matrix: Option<TransitionMatrix>,

    final_states: Option<Vec<State>>,
    final_start_matrix: Option<StartMatrix>,
    final_transition_matrix: Option<TransitionMatrix>,

    log_likelihood_history: Vec<f64>,
    converged: bool,
    iterations: u32,
}


impl BaumWelch {
    pub fn new(num_states: usize) -> Self {

        Self {
            num_states,
            min_covar: DEFAULT_MIN_COVAR,
            covars_prior: DEFAULT_COVARS_PRIOR,

            initial_states: None,
            initial_start_matrix: None,
            initial_transition_matrix: None,

            final_states: None,
            final_start_matrix: None,
            final_transition_matrix: None,

            log_likelihood_history: Vec::new(),
            converged: false,
            iterations: 0,
        }
    }

    pub fn set_covariance_regularization(&mut self, min_covar: f64, covars_prior: f64) -> Result<(), BaumWelchError> {
        if !(min_covar > 0.0 && min_covar.is_finite()) || !(covars_prior >= 0.0 && covars_prior.is_finite()) {
            return Err(BaumWelchError::InvalidRegularization { min_covar, covars_prior });
        }

        self.min_covar = min_covar;
        self.covars_prior = covars_prior;

        Ok(())
    }

    pub fn set_initial_states(&mut self, states: Vec<State>) -> Result<(), BaumWelchError>{

        // Check if the number of states is correct according to the initial argument to the constructor
        let expected_num = self.num_states;
        let given_num = states.len();
        if expected_num != given_num {
            return Err(BaumWelchError::IncorrectNumberOfInitialStates{expected: expected_num, given: given_num});
        }

        HMMInstance::check_states_validity(&states)
            .map_err(|error| BaumWelchError::InvalidInitialStateSet { error })?;

        self.initial_states = Some(states);

        Ok(())
    }

    pub fn set_initial_start_matrix(&mut self, start_matrix: StartMatrix) -> Result<(), BaumWelchError> {
        HMMInstance::check_start_matrix_validity(&start_matrix, self.num_states)
            .map_err(|error| BaumWelchError::InvalidInitialStartMatrix { error })?;

        self.initial_start_matrix = Some(start_matrix);

        Ok(())
    }

    pub fn set_initial_transition_matrix(&mut self, transition_matrix: TransitionMatrix) -> Result<(), BaumWelchError> {
        HMMInstance::check_transition_matrix_validity(&transition_matrix, self.num_states)
            .map_err(|error| BaumWelchError::InvalidInitialTransitionMatrix { error })?;

        self.initial_transition_matrix = Some(transition_matrix);

        Ok(())
    }

    pub fn update_start_matrix(states: &[State], gammas: &StateMatrix2D<f64>, start_matrix: &mut StartMatrix) {
        for state in states {
            start_matrix[state] = gammas[state][0];
        }
    }

    // Row-normalize the expected transition counts. A row nobody transitioned out of keeps its old values.
    pub fn update_transition_matrix(
        states: &[State],
        expected_transitions: &StateMatrix2D<f64>,
        transition_matrix: &mut TransitionMatrix,
    ) {
        for state_from in states {
            let row_sum: f64 = expected_transitions[state_from].iter().sum();

            if row_sum <= 0.0 || !row_sum.is_finite() {
                continue;
            }

            for state_to in states {
                transition_matrix[(state_from, state_to)] = expected_transitions[state_from][state_to.id] / row_sum;
            }
        }
    }

    // Gamma-weighted means and diagonal variances
    pub fn update_states(
        states: &[State],
        gammas: &StateMatrix2D<f64>,
        observations: &ObservationMatrix,
        min_covar: f64,
        covars_prior: f64,
    ) -> Result<Vec<State>, BaumWelchError> {
        let num_features = observations.num_features();
        let mut new_states = Vec::with_capacity(states.len());

        for state in states {
            let occupancy: f64 = gammas[state].iter().sum();

            if occupancy <= f64::MIN_POSITIVE || !occupancy.is_finite() {
                return Err(BaumWelchError::StateCollapsed { state: state.id, occupancy });
            }

            let mut weighted_sum = DVector::<f64>::zeros(num_features);
            for (t, observation) in observations.rows().enumerate() {
                weighted_sum += observation * gammas[state][t];
            }
            let mean = weighted_sum / occupancy;

            let mut weighted_squares = DVector::<f64>::zeros(num_features);
            for (t, observation) in observations.rows().enumerate() {
                let deviation = observation - &mean;
                weighted_squares += deviation.component_mul(&deviation) * gammas[state][t];
            }

            let variance = weighted_squares
                .map(|value| (covars_prior + value) / occupancy.max(MIN_OCCUPANCY_DENOMINATOR))
                .map(|value| value.max(min_covar));

            let mut new_state = State::new(state.id, mean, variance)
                .map_err(|error| BaumWelchError::DegenerateState { state: state.id, error })?;

            if let Some(name) = state.get_name() {
                new_state.set_name(name.to_string());
            }

            new_states.push(new_state);
        }

        Ok(new_states)
    }

    pub fn run_optimization(
        &mut self,
        observations: &ObservationMatrix,
        termination_criterium: TerminationCriterium,
    ) -> Result<(), BaumWelchError> {
        let mut states = self.initial_states.clone().ok_or(BaumWelchError::InitialStatesNotSet)?;
        let mut start_matrix = self.initial_start_matrix.clone().ok_or(BaumWelchError::InitialStartMatrixNotSet)?;
        let mut transition_matrix = self.initial_transition_matrix.clone().ok_or(BaumWelchError::InitialTransitionMatrixNotSet)?;

        HMMInstance::check_observations_validity(observations, states[0].num_features())
            .map_err(|error| BaumWelchError::HMMInstanceError { error })?;

        if observations.num_observations() < self.num_states {
            return Err(BaumWelchError::NotEnoughObservations {
                num_observations: observations.num_observations(),
                num_states: self.num_states,
            });
        }

        let mut tracker = OptimizationTracker::new(termination_criterium);

        loop {
            // E-step
            let mut hmm_instance = HMMInstance::new(&states, &start_matrix, &transition_matrix);
            hmm_instance
                .run_all_probability_matrices(observations)
                .map_err(|error| BaumWelchError::HMMInstanceError { error })?;

            let log_likelihood = hmm_instance.get_log_likelihood().ok_or(BaumWelchError::LogLikelihoodNotFound)?;
            let gammas = hmm_instance.take_gammas().ok_or(BaumWelchError::GammasNotFound)?;
            let expected_transitions = hmm_instance.take_expected_transitions().ok_or(BaumWelchError::ExpectedTransitionsNotFound)?;

            // M-step
            let new_states = Self::update_states(&states, &gammas, observations, self.min_covar, self.covars_prior)
                .inspect_err(|error| warn!("Baum-Welch stopped at iteration {}: {}", tracker.iterations() + 1, error))?;
            Self::update_start_matrix(&states, &gammas, &mut start_matrix);
            Self::update_transition_matrix(&states, &expected_transitions, &mut transition_matrix);
            states = new_states;

            let stop = tracker.step(log_likelihood);
            debug!("Baum-Welch iteration {}: log-likelihood {:.6}", tracker.iterations(), log_likelihood);

            if stop { break; }
        }

        if tracker.converged() {
            info!("Baum-Welch converged after {} iterations", tracker.iterations());
        } else {
            info!("Baum-Welch reached the iteration cap ({}) without converging", tracker.iterations());
        }

        self.converged = tracker.converged();
        self.iterations = tracker.iterations();
        self.log_likelihood_history = tracker.take_history();

        self.final_states = Some(states);
        self.final_start_matrix = Some(start_matrix);
        self.final_transition_matrix = Some(transition_matrix);

        Ok(())
    }

    pub fn take_states(&mut self) -> Option<Vec<State>> {
        self.final_states.take()
    }

    pub fn take_start_matrix(&mut self) -> Option<StartMatrix> {
        self.final_start_matrix.take()
    }

    pub fn take_transition_matrix(&mut self) -> Option<TransitionMatrix> {
        self.final_transition_matrix.take()
    }

    // Log-likelihood of the parameters that entered the last iteration
    pub fn get_log_likelihood(&self) -> Option<f64> {
        self.log_likelihood_history.last().copied()
    }

    pub fn get_log_likelihood_history(&self) -> &[f64] {
        &self.log_likelihood_history
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}


#[derive(Debug, Clone, PartialEq, Error)]
pub enum BaumWelchError {
    #[error("expected {expected} initial states, got {given}")]
    IncorrectNumberOfInitialStates { expected: usize, given: usize },
    #[error("invalid initial states: {error}")]
    InvalidInitialStateSet { error: HMMInstanceError },
    #[error("invalid initial start matrix: {error}")]
    InvalidInitialStartMatrix { error: HMMInstanceError },
    #[error("invalid initial transition matrix: {error}")]
    InvalidInitialTransitionMatrix { error: HMMInstanceError },
    #[error("invalid covariance regularization: min_covar {min_covar}, covars_prior {covars_prior}")]
    InvalidRegularization { min_covar: f64, covars_prior: f64 },
    #[error("initial states were not set")]
    InitialStatesNotSet,
    #[error("initial start matrix was not set")]
    InitialStartMatrixNotSet,
    #[error("initial transition matrix was not set")]
    InitialTransitionMatrixNotSet,
    #[error("{num_observations} observations are not enough to fit {num_states} states")]
    NotEnoughObservations { num_observations: usize, num_states: usize },
    #[error("state {state} collapsed, expected occupancy {occupancy}")]
    StateCollapsed { state: usize, occupancy: f64 },
    #[error("state {state} re-estimated to invalid parameters: {error}")]
    DegenerateState { state: usize, error: StateError },
    #[error("{error}")]
    HMMInstanceError { error: HMMInstanceError },
    #[error("log-likelihood was not computed")]
    LogLikelihoodNotFound,
    #[error("gammas were not computed")]
    GammasNotFound,
    #[error("expected transitions were not computed")]
    ExpectedTransitionsNotFound,
}
