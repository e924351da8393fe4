/********** Hidden Markov Model (HMM) Module for Movement Analysis **********
* Gaussian-emission HMM with diagonal covariances:
*
* - k-means seeded initialization (initialization/)
* - Baum-Welch parameter estimation in log space (baum_welch.rs)
* - Viterbi decoding of the most likely state path (viterbi.rs)
* - Semantic labels for the decoded states (state_labels.rs, decoder.rs)
**********/

use nalgebra::DMatrix;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;


pub mod hmm_tools;
pub mod state;
pub mod observations;
pub mod hmm_matrices;
pub mod probability_matrices;
pub mod viterbi;
pub mod hmm_instance;
pub mod baum_welch;
pub mod optimization_tracker;
pub mod initialization;
pub mod analysis;
pub mod state_labels;
pub mod decoder;

pub use state::*;
pub use hmm_matrices::*;
pub use observations::{ObservationError, ObservationMatrix};
pub use state_labels::{StateLabels, UNKNOWN_STATE};
pub use decoder::{decode, decode_series, DecodeError, DecodedSequence, DecoderSetup, FittedModel, MovementDecoder};


pub struct HMM {

}

impl HMM {
    // Sample a state path and one observation row per time step from known parameters
    pub fn gen_sequence<R: Rng + ?Sized>(
        states: &[State],
        start_matrix: &StartMatrix,
        transition_matrix: &TransitionMatrix,
        time_steps: usize,
        rng: &mut R,
    ) -> Result<(Vec<usize>, ObservationMatrix), SequenceGenerationError> {
        hmm_instance::HMMInstance::check_validity(states, start_matrix, transition_matrix)
            .map_err(|error| SequenceGenerationError::InvalidModel { error })?;

        let num_features = states[0].num_features();
        let mut sequence = Vec::with_capacity(time_steps);
        let mut values = DMatrix::<f64>::zeros(time_steps, num_features);

        if time_steps == 0 {
            let observations = ObservationMatrix::from_dmatrix(values)
                .map_err(|error| SequenceGenerationError::Observations { error })?;
            return Ok((sequence, observations));
        }

        let start_dist = WeightedIndex::new(&start_matrix.matrix)
            .map_err(|_| SequenceGenerationError::InvalidDistribution { state: None })?;

        let transition_dists = transition_matrix
            .rows()
            .iter()
            .enumerate()
            .map(|(state, row)| {
                WeightedIndex::new(row).map_err(|_| SequenceGenerationError::InvalidDistribution { state: Some(state) })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Get the objects for the Normal dist of each feature of each state
        let normal_distributions = states
            .iter()
            .map(|state| {
                state
                    .get_mean()
                    .iter()
                    .zip(state.get_variance().iter())
                    .map(|(&mean, &variance)| Normal::new(mean, variance.sqrt()))
                    .collect::<Result<Vec<Normal<f64>>, _>>()
                    .map_err(|_| SequenceGenerationError::InvalidDistribution { state: Some(state.id) })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Start by choosing the initial state based on the start matrix
        let mut current_state = start_dist.sample(rng);

        for t in 0..time_steps {
            if t > 0 {
                current_state = transition_dists[current_state].sample(rng);
            }
            sequence.push(current_state);

            // Sample from this state's dist to get the current row
            for (feature, normal) in normal_distributions[current_state].iter().enumerate() {
                values[(t, feature)] = normal.sample(rng);
            }
        }

        let observations = ObservationMatrix::from_dmatrix(values)
            .map_err(|error| SequenceGenerationError::Observations { error })?;

        Ok((sequence, observations))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceGenerationError {
    #[error("invalid model: {error}")]
    InvalidModel { error: hmm_instance::HMMInstanceError },
    #[error("cannot sample from the distribution of state {state:?}")]
    InvalidDistribution { state: Option<usize> },
    #[error("{error}")]
    Observations { error: ObservationError },
}
