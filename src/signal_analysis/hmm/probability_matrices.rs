use super::hmm_tools::{log_sum_exp, safe_ln, StateMatrix2D};
use super::hmm_matrices::*;
use super::observations::ObservationMatrix;
use super::state::*;

// Everything here runs in log space. Rows are states, columns are time steps.

pub fn compute_log_emissions(
    states: &[State],
    observations: &ObservationMatrix,
    log_emissions: &mut StateMatrix2D<f64>,
) {
    for t in 0..observations.num_observations() {
        for state in states {
            log_emissions[state][t] = state.log_emission_probability(observations.row(t));
        }
    }
}

pub fn log_transition_matrix(transition_matrix: &TransitionMatrix) -> StateMatrix2D<f64> {
    StateMatrix2D::new(
        transition_matrix
            .rows()
            .iter()
            .map(|row| row.iter().map(|&prob| safe_ln(prob)).collect())
            .collect(),
    )
}

// Returns ln P(observations | model)
pub fn compute_log_alphas(
    states: &[State],
    start_matrix: &StartMatrix,
    transition_matrix: &TransitionMatrix,
    log_emissions: &StateMatrix2D<f64>,
    log_alphas: &mut StateMatrix2D<f64>,
) -> f64 {
    let num_observations = log_emissions.shape().1;
    if num_observations == 0 {
        return 0.0;
    }

    let log_transitions = log_transition_matrix(transition_matrix);
    let mut terms = vec![0.0; states.len()];

    // Base case: start probability times emission
    for state in states {
        log_alphas[state][0] = safe_ln(start_matrix[state]) + log_emissions[state][0];
    }

    for t in 1..num_observations {
        for current_state in states {
            // Sum over all previous states, following the transition probabilities
            for previous_state in states {
                terms[previous_state.id] =
                    log_alphas[previous_state][t - 1] + log_transitions[previous_state.id][current_state.id];
            }

            log_alphas[current_state][t] = log_sum_exp(&terms) + log_emissions[current_state][t];
        }
    }

    let last: Vec<f64> = states.iter().map(|state| log_alphas[state][num_observations - 1]).collect();
    log_sum_exp(&last)
}

pub fn compute_log_betas(
    states: &[State],
    transition_matrix: &TransitionMatrix,
    log_emissions: &StateMatrix2D<f64>,
    log_betas: &mut StateMatrix2D<f64>,
) {
    let num_observations = log_emissions.shape().1;
    if num_observations == 0 {
        return;
    }

    let log_transitions = log_transition_matrix(transition_matrix);
    let mut terms = vec![0.0; states.len()];

    // Base case: beta at the last time step is 1
    for state in states {
        log_betas[state][num_observations - 1] = 0.0;
    }

    for t in (0..num_observations - 1).rev() {
        for current_state in states {
            for next_state in states {
                terms[next_state.id] = log_transitions[current_state.id][next_state.id]
                    + log_emissions[next_state][t + 1]
                    + log_betas[next_state][t + 1];
            }

            log_betas[current_state][t] = log_sum_exp(&terms);
        }
    }
}

// Posterior probability of each state at each time step
pub fn compute_gammas(
    states: &[State],
    log_alphas: &StateMatrix2D<f64>,
    log_betas: &StateMatrix2D<f64>,
    log_likelihood: f64,
    gammas: &mut StateMatrix2D<f64>,
) {
    let num_observations = log_alphas.shape().1;

    for t in 0..num_observations {
        let mut normalization = 0.0;

        for state in states {
            let gamma = (log_alphas[state][t] + log_betas[state][t] - log_likelihood).exp();
            gammas[state][t] = gamma;
            normalization += gamma;
        }

        // Absorb rounding so every column sums to exactly 1
        if normalization > 0.0 {
            for state in states {
                gammas[state][t] /= normalization;
            }
        }
    }
}

// Expected number of i -> j transitions summed over the whole sequence
pub fn compute_expected_transitions(
    states: &[State],
    transition_matrix: &TransitionMatrix,
    log_emissions: &StateMatrix2D<f64>,
    log_alphas: &StateMatrix2D<f64>,
    log_betas: &StateMatrix2D<f64>,
    log_likelihood: f64,
    expected_transitions: &mut StateMatrix2D<f64>,
) {
    let num_observations = log_alphas.shape().1;
    let log_transitions = log_transition_matrix(transition_matrix);

    for t in 0..num_observations.saturating_sub(1) {
        for state_from in states {
            for state_to in states {
                let log_xi = log_alphas[state_from][t]
                    + log_transitions[state_from.id][state_to.id]
                    + log_emissions[state_to][t + 1]
                    + log_betas[state_to][t + 1]
                    - log_likelihood;

                expected_transitions[state_from][state_to.id] += log_xi.exp();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_model() -> (Vec<State>, StartMatrix, TransitionMatrix, ObservationMatrix) {
        let states = vec![
            State::new_1d(0, 0.0, 1.0).unwrap(),
            State::new_1d(1, 3.0, 1.5).unwrap(),
        ];
        let start_matrix = StartMatrix::new(vec![0.6, 0.4]);
        let transition_matrix = TransitionMatrix::new(vec![vec![0.7, 0.3], vec![0.2, 0.8]]);
        let observations = ObservationMatrix::from_series(&[0.1, 2.5, 3.2]).unwrap();

        (states, start_matrix, transition_matrix, observations)
    }

    fn run_forward_backward(
        states: &[State],
        start_matrix: &StartMatrix,
        transition_matrix: &TransitionMatrix,
        observations: &ObservationMatrix,
    ) -> (StateMatrix2D<f64>, StateMatrix2D<f64>, StateMatrix2D<f64>, f64) {
        let shape = (states.len(), observations.num_observations());
        let mut log_emissions = StateMatrix2D::empty(shape);
        let mut log_alphas = StateMatrix2D::empty(shape);
        let mut log_betas = StateMatrix2D::empty(shape);

        compute_log_emissions(states, observations, &mut log_emissions);
        let log_likelihood = compute_log_alphas(states, start_matrix, transition_matrix, &log_emissions, &mut log_alphas);
        compute_log_betas(states, transition_matrix, &log_emissions, &mut log_betas);

        (log_emissions, log_alphas, log_betas, log_likelihood)
    }

    // Brute force: sum the joint probability over every one of the K^T paths
    fn brute_force_likelihood(
        states: &[State],
        start_matrix: &StartMatrix,
        transition_matrix: &TransitionMatrix,
        observations: &ObservationMatrix,
    ) -> f64 {
        let num_states = states.len();
        let num_observations = observations.num_observations();
        let mut total = 0.0;

        for code in 0..num_states.pow(num_observations as u32) {
            let mut path = Vec::with_capacity(num_observations);
            let mut rest = code;
            for _ in 0..num_observations {
                path.push(rest % num_states);
                rest /= num_states;
            }

            let mut prob = start_matrix[path[0]] * states[path[0]].emission_probability(observations.row(0));
            for t in 1..num_observations {
                prob *= transition_matrix[(path[t - 1], path[t])] * states[path[t]].emission_probability(observations.row(t));
            }
            total += prob;
        }

        total
    }

    #[test]
    fn test_log_likelihood_matches_brute_force() {
        let (states, start_matrix, transition_matrix, observations) = two_state_model();
        let (_, _, _, log_likelihood) = run_forward_backward(&states, &start_matrix, &transition_matrix, &observations);

        let expected = brute_force_likelihood(&states, &start_matrix, &transition_matrix, &observations).ln();
        assert!((log_likelihood - expected).abs() < 1e-10);
    }

    // Forward and backward passes must agree on the likelihood at every time step
    #[test]
    fn test_alphas_and_betas_consistent() {
        let (states, start_matrix, transition_matrix, observations) = two_state_model();
        let (_, log_alphas, log_betas, log_likelihood) = run_forward_backward(&states, &start_matrix, &transition_matrix, &observations);

        for t in 0..observations.num_observations() {
            let terms: Vec<f64> = states.iter().map(|state| log_alphas[state][t] + log_betas[state][t]).collect();
            assert!((log_sum_exp(&terms) - log_likelihood).abs() < 1e-10);
        }
    }

    #[test]
    fn test_gammas_sum_to_one() {
        let (states, start_matrix, transition_matrix, observations) = two_state_model();
        let (_, log_alphas, log_betas, log_likelihood) = run_forward_backward(&states, &start_matrix, &transition_matrix, &observations);

        let mut gammas = StateMatrix2D::empty((2, 3));
        compute_gammas(&states, &log_alphas, &log_betas, log_likelihood, &mut gammas);

        for t in 0..3 {
            let sum: f64 = states.iter().map(|state| gammas[state][t]).sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        // First observation sits right on state 0
        assert!(gammas[0][0] > gammas[1][0]);
    }

    // Expected transitions over T-1 steps must add up to T-1
    #[test]
    fn test_expected_transitions_total() {
        let (states, start_matrix, transition_matrix, observations) = two_state_model();
        let (log_emissions, log_alphas, log_betas, log_likelihood) =
            run_forward_backward(&states, &start_matrix, &transition_matrix, &observations);

        let mut expected_transitions = StateMatrix2D::empty((2, 2));
        compute_expected_transitions(
            &states, &transition_matrix, &log_emissions, &log_alphas, &log_betas, log_likelihood, &mut expected_transitions,
        );

        let total: f64 = expected_transitions.iter().flat_map(|row| row.iter()).sum();
        assert!((total - 2.0).abs() < 1e-10);
    }

    // Points far from every state underflow in probability space but not here
    #[test]
    fn test_far_observations_stay_finite() {
        let (states, start_matrix, transition_matrix, _) = two_state_model();
        let observations = ObservationMatrix::from_series(&[1.0e3, -1.0e3, 5.0e2]).unwrap();
        let (_, _, _, log_likelihood) = run_forward_backward(&states, &start_matrix, &transition_matrix, &observations);

        assert!(log_likelihood.is_finite());
    }
}
