use std::fmt;

use nalgebra::DVector;
use rand::Rng;

use crate::signal_analysis::hmm::observations::ObservationMatrix;

use super::hmm_initializer::HMMInitializerError;
use super::kmeans::*;

pub const KMEANS_MAX_ITERS_DEFAULT: usize = 300;
pub const KMEANS_TOLERANCE_DEFAULT: f64 = 1e-4;
pub const KMEANS_NUM_TRIES_DEFAULT: usize = 10;

/// k-means settings used to place the initial state means
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansInit {
    pub max_iters: usize,
    pub tolerance: f64,
    pub num_tries: usize,
}

impl Default for KMeansInit {
    fn default() -> Self {
        Self {
            max_iters: KMEANS_MAX_ITERS_DEFAULT,
            tolerance: KMEANS_TOLERANCE_DEFAULT,
            num_tries: KMEANS_NUM_TRIES_DEFAULT,
        }
    }
}

impl KMeansInit {
    pub fn with_num_tries(num_tries: usize) -> Self {
        Self { num_tries, ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), HMMInitializerError> {
        if self.max_iters == 0 || self.num_tries == 0 || !(self.tolerance >= 0.0) {
            return Err(HMMInitializerError::InvalidInput);
        }
        Ok(())
    }

    // One mean vector per state, ordered by the first feature
    pub fn get_state_values<R: Rng + ?Sized>(
        &self,
        num_states: usize,
        observations: &ObservationMatrix,
        rng: &mut R,
    ) -> Result<Vec<DVector<f64>>, HMMInitializerError> {
        if observations.num_observations() < num_states {
            return Err(HMMInitializerError::NotEnoughObservations {
                num_observations: observations.num_observations(),
                num_states,
            });
        }

        let mut state_values =
            k_means_best_of(observations, num_states, self.max_iters, self.tolerance, self.num_tries, rng).centers;

        state_values.sort_by(|a, b| a[0].total_cmp(&b[0]));

        Ok(state_values)
    }
}

impl fmt::Display for KMeansInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KMeansClustering (max iterations {}, tolerance {}, tries {})",
            self.max_iters, self.tolerance, self.num_tries
        )
    }
}
