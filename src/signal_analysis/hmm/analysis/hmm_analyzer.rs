use thiserror::Error;

use crate::signal_analysis::hmm::hmm_instance::{HMMInstance, HMMInstanceError};
use crate::signal_analysis::hmm::observations::ObservationMatrix;
use crate::signal_analysis::hmm::{StartMatrix, State, TransitionMatrix};

// Decodes an observation matrix with already known parameters
#[derive(Debug, Default)]
pub struct HMMAnalyzer {
    observations: Option<ObservationMatrix>,

    states: Option<Vec<State>>,
    start_matrix: Option<StartMatrix>,
    transition_matrix: Option<TransitionMatrix>,

    sequence_states: Option<Vec<usize>>,
    log_probability: Option<f64>,
    state_occupancy: Option<Vec<f64>>,
}

impl HMMAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observations(&mut self, observations: ObservationMatrix) -> Result<(), HMMAnalyzerError> {
        if observations.is_empty() {
            return Err(HMMAnalyzerError::HMMInstanceError { err: HMMInstanceError::EmptySequence });
        }
        self.observations = Some(observations);

        Ok(())
    }

    pub fn set_states(&mut self, states: Vec<State>) -> Result<(), HMMAnalyzerError> {
        HMMInstance::check_states_validity(&states)
        .map_err(|err| HMMAnalyzerError::HMMInstanceError { err })?;

        self.states = Some(states);

        Ok(())
    }

    pub fn set_start_matrix(&mut self, start_matrix: StartMatrix) -> Result<(), HMMAnalyzerError> {
        let num_states = self.states.as_ref().ok_or(HMMAnalyzerError::StatesNotDefined)?.len();

        HMMInstance::check_start_matrix_validity(&start_matrix, num_states)
        .map_err(|err| HMMAnalyzerError::HMMInstanceError { err })?;

        self.start_matrix = Some(start_matrix);

        Ok(())
    }

    pub fn set_transition_matrix(&mut self, transition_matrix: TransitionMatrix) -> Result<(), HMMAnalyzerError> {
        let num_states = self.states.as_ref().ok_or(HMMAnalyzerError::StatesNotDefined)?.len();

        HMMInstance::check_transition_matrix_validity(&transition_matrix, num_states)
        .map_err(|err| HMMAnalyzerError::HMMInstanceError { err })?;

        self.transition_matrix = Some(transition_matrix);

        Ok(())
    }

    pub fn setup(
        &mut self,
        observations: ObservationMatrix,
        states: Vec<State>,
        start_matrix: StartMatrix,
        transition_matrix: TransitionMatrix,
    )  -> Result<(), HMMAnalyzerError>
    {
        self.set_observations(observations)?;
        self.set_states(states)?;
        self.set_start_matrix(start_matrix)?;
        self.set_transition_matrix(transition_matrix)?;

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), HMMAnalyzerError> {
        // Check if everything is set
        let observations = self.observations.as_ref().ok_or(HMMAnalyzerError::ObservationsNotDefined)?;
        let states = self.states.as_ref().ok_or(HMMAnalyzerError::StatesNotDefined)?;
        let start_matrix = self.start_matrix.as_ref().ok_or(HMMAnalyzerError::StartMatrixNotDefined)?;
        let transition_matrix = self.transition_matrix.as_ref().ok_or(HMMAnalyzerError::TransitionMatrixNotDefined)?;

        // Get viterbi predicted state sequence
        let (viterbi_pred, log_probability) =
        Self::compute_viterbi_prediction(observations, states, start_matrix, transition_matrix)?;

        // Get state occupancy
        let state_occupancy = Self::compute_state_occupancy(&viterbi_pred, states.len());

        self.sequence_states = Some(viterbi_pred);
        self.log_probability = Some(log_probability);
        self.state_occupancy = Some(state_occupancy);

        Ok(())
    }

    pub fn compute_viterbi_prediction(
        observations: &ObservationMatrix,
        states: &[State],
        start_matrix: &StartMatrix,
        transition_matrix: &TransitionMatrix
    ) -> Result<(Vec<usize>, f64), HMMAnalyzerError> {
        let hmm_instance = HMMInstance::new(states, start_matrix, transition_matrix);

        hmm_instance.run_viterbi(observations)
        .map_err(|err| HMMAnalyzerError::HMMInstanceError { err })
    }

    // Fraction of time steps spent in each of the num_states states
    pub fn compute_state_occupancy(state_sequence: &[usize], num_states: usize) -> Vec<f64> {
        // Return empty vector if state sequence is empty
        if state_sequence.is_empty() {return vec![0.0; num_states]}

        // Ids beyond num_states still get a slot
        let num_slots = state_sequence.iter().max().map_or(num_states, |max| num_states.max(max + 1));
        let sequence_len = state_sequence.len();

        let mut state_dwell_count = vec![0_usize; num_slots];
        state_sequence.iter().for_each(|state_id| state_dwell_count[*state_id] += 1);

        state_dwell_count.iter().map(|state_count| *state_count as f64 / sequence_len as f64).collect()
    }

    pub fn get_states(&self) -> Option<&Vec<State>> {
        self.states.as_ref()
    }

    pub fn get_start_matrix(&self) -> Option<&StartMatrix> {
        self.start_matrix.as_ref()
    }

    pub fn get_transition_matrix(&self) -> Option<&TransitionMatrix> {
        self.transition_matrix.as_ref()
    }

    pub fn get_observations(&self) -> Option<&ObservationMatrix> {
        self.observations.as_ref()
    }

    pub fn get_states_sequence(&self) -> Option<&Vec<usize>> {
        self.sequence_states.as_ref()
    }

    pub fn take_states_sequence(&mut self) -> Option<Vec<usize>> {
        self.sequence_states.take()
    }

    pub fn get_log_probability(&self) -> Option<f64> {
        self.log_probability
    }

    pub fn get_state_occupancy(&self) -> Option<&Vec<f64>> {
        self.state_occupancy.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HMMAnalyzerError {
    #[error("{err}")]
    HMMInstanceError { err: HMMInstanceError },

    #[error("states are not defined")]
    StatesNotDefined,
    #[error("start matrix is not defined")]
    StartMatrixNotDefined,
    #[error("transition matrix is not defined")]
    TransitionMatrixNotDefined,
    #[error("observations are not defined")]
    ObservationsNotDefined,
}
