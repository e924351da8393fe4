use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::signal_analysis::hmm::hmm_instance::{HMMInstance, HMMInstanceError};
use crate::signal_analysis::hmm::observations::ObservationMatrix;
use crate::signal_analysis::hmm::{StartMatrix, State, StateError, TransitionMatrix};

use super::init_method_structs::*;

// Starting point handed to Baum-Welch
#[derive(Debug, Clone)]
pub struct InitialValues {
    pub states: Vec<State>,
    pub start_matrix: StartMatrix,
    pub transition_matrix: TransitionMatrix,
}

#[derive(Debug, Clone)]
pub struct HMMInitializer {
    kmeans: KMeansInit,

    min_covar: f64, // Added to the data variance of every state
}

impl HMMInitializer {
    pub fn new(min_covar: f64) -> Self {
        HMMInitializer {
            kmeans: KMeansInit::default(),
            min_covar,
        }
    }

    pub fn set_kmeans(&mut self, kmeans: KMeansInit) -> Result<(), HMMInitializerError> {
        kmeans.validate()?;
        self.kmeans = kmeans;

        Ok(())
    }

    pub fn get_initial_values<R: Rng + ?Sized>(
        &self,
        observations: &ObservationMatrix,
        num_states: usize,
        rng: &mut R,
    ) -> Result<InitialValues, HMMInitializerError> {
        if num_states == 0 { return Err(HMMInitializerError::InvalidNumberOfStates) }
        if observations.num_observations() == 0 { return Err(HMMInitializerError::EmptyObservationSequence) }

        debug!("Initializing {} states with {}", num_states, self.kmeans);

        let state_values = self.kmeans.get_state_values(num_states, observations, rng)?;

        // Every state starts with the spread of the whole data set
        let variance = observations.feature_variances().map(|value| value + self.min_covar);

        let states = state_values
            .into_iter()
            .enumerate()
            .map(|(id, mean)| State::new(id, mean, variance.clone()))
            .collect::<Result<Vec<State>, StateError>>()
            .map_err(|error| HMMInitializerError::StateError { error })?;

        // Uniform start and transition probabilities
        let start_matrix = StartMatrix::new_uniform(num_states);
        let transition_matrix = TransitionMatrix::new_uniform(num_states);

        HMMInstance::check_validity(&states, &start_matrix, &transition_matrix)
            .map_err(|error| HMMInitializerError::HMMInstanceError { error })?;

        Ok(InitialValues { states, start_matrix, transition_matrix })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HMMInitializerError {
    #[error("number of states must be at least 1")]
    InvalidNumberOfStates,
    #[error("observation sequence is empty")]
    EmptyObservationSequence,
    #[error("{num_observations} observations cannot seed {num_states} states")]
    NotEnoughObservations { num_observations: usize, num_states: usize },
    #[error("invalid initialization parameter")]
    InvalidInput,
    #[error("{error}")]
    StateError { error: StateError },
    #[error("{error}")]
    HMMInstanceError { error: HMMInstanceError },
}
