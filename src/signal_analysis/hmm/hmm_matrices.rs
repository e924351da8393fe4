use thiserror::Error;

use super::state::*;
use super::hmm_tools::*;
use std::ops::{Index, IndexMut};

pub trait ProbabilityMatrix {
    fn validate(&self) -> Result<(), MatrixValidationError>;
}

// Tolerance used when checking that probabilities sum to 1
const SUM_MARGIN: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixValidationError {
    #[error("transition matrix must be square and non-empty")]
    IncorrectShape,
    #[error("start probabilities do not sum to 1: {values:?}")]
    VectorIncorrectValues { values: Vec<f64> },
    #[error("rows {rows:?} do not sum to 1")]
    RowsIncorrectValues { rows: Vec<usize>, values: Vec<Vec<f64>> },
    #[error("matrix is all zeros")]
    MatrixEmpty,
    #[error("rows {rows:?} are all zeros")]
    RowsEmpty { rows: Vec<usize> },
    #[error("matrix holds a value outside [0, 1]")]
    InvalidValue,
}

// How a single probability vector fails, if it does
enum DistributionCheck {
    Valid,
    OutOfRange,
    AllZero,
    BadSum,
}

fn check_distribution(values: &[f64]) -> DistributionCheck {
    if values.iter().any(|&value| !(0.0..=1.0 + SUM_MARGIN).contains(&value)) {
        DistributionCheck::OutOfRange
    } else if values.iter().all(|&value| value == 0.0) {
        DistributionCheck::AllZero
    } else if (values.iter().sum::<f64>() - 1.0).abs() > SUM_MARGIN {
        DistributionCheck::BadSum
    } else {
        DistributionCheck::Valid
    }
}

/// Row `i` holds the probabilities of moving from state `i` to every state.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    pub matrix: StateMatrix2D<f64>,
}

impl TransitionMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { matrix: StateMatrix2D::new(rows) }
    }

    pub fn new_uniform(num_states: usize) -> Self {
        let prob = 1.0 / num_states as f64;
        Self { matrix: StateMatrix2D::filled((num_states, num_states), prob) }
    }

    pub fn num_states(&self) -> usize {
        self.matrix.len()
    }

    pub fn rows(&self) -> &Vec<Vec<f64>> {
        &self.matrix.raw_matrix
    }
}

impl ProbabilityMatrix for TransitionMatrix {
    fn validate(&self) -> Result<(), MatrixValidationError> {
        let size = self.matrix.len();
        if size == 0 || self.matrix.iter().any(|row| row.len() != size) {
            return Err(MatrixValidationError::IncorrectShape);
        }

        let mut empty_rows = Vec::new();
        let mut bad_rows = Vec::new();

        for (i, row) in self.matrix.iter().enumerate() {
            match check_distribution(row) {
                DistributionCheck::OutOfRange => return Err(MatrixValidationError::InvalidValue),
                DistributionCheck::AllZero => empty_rows.push(i),
                DistributionCheck::BadSum => bad_rows.push(i),
                DistributionCheck::Valid => {}
            }
        }

        if empty_rows.len() == size {
            Err(MatrixValidationError::MatrixEmpty)
        } else if !empty_rows.is_empty() {
            Err(MatrixValidationError::RowsEmpty { rows: empty_rows })
        } else if !bad_rows.is_empty() {
            let values = bad_rows.iter().map(|&i| self.matrix[i].clone()).collect();
            Err(MatrixValidationError::RowsIncorrectValues { rows: bad_rows, values })
        } else {
            Ok(())
        }
    }
}

impl Index<(usize, usize)> for TransitionMatrix {
    type Output = f64;

    fn index(&self, (from, to): (usize, usize)) -> &Self::Output {
        &self.matrix[from][to]
    }
}

impl Index<(&State, &State)> for TransitionMatrix {
    type Output = f64;

    fn index(&self, (from, to): (&State, &State)) -> &Self::Output {
        &self.matrix[from.id][to.id]
    }
}

impl IndexMut<(usize, usize)> for TransitionMatrix {
    fn index_mut(&mut self, (from, to): (usize, usize)) -> &mut Self::Output {
        &mut self.matrix[from][to]
    }
}

impl IndexMut<(&State, &State)> for TransitionMatrix {
    fn index_mut(&mut self, (from, to): (&State, &State)) -> &mut Self::Output {
        &mut self.matrix[from.id][to.id]
    }
}

/// Probability of each state at the first time step.
#[derive(Debug, Clone, PartialEq)]
pub struct StartMatrix {
    pub matrix: Vec<f64>,
}

impl StartMatrix {
    pub fn new(matrix: Vec<f64>) -> Self {
        Self { matrix }
    }

    pub fn new_uniform(num_states: usize) -> Self {
        Self::new(vec![1.0 / num_states as f64; num_states])
    }

    pub fn num_states(&self) -> usize {
        self.matrix.len()
    }
}

impl ProbabilityMatrix for StartMatrix {
    fn validate(&self) -> Result<(), MatrixValidationError> {
        match check_distribution(&self.matrix) {
            DistributionCheck::Valid => Ok(()),
            DistributionCheck::OutOfRange => Err(MatrixValidationError::InvalidValue),
            DistributionCheck::AllZero => Err(MatrixValidationError::MatrixEmpty),
            DistributionCheck::BadSum => Err(MatrixValidationError::VectorIncorrectValues { values: self.matrix.clone() }),
        }
    }
}

impl Index<usize> for StartMatrix {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.matrix[index]
    }
}

impl Index<&State> for StartMatrix {
    type Output = f64;

    fn index(&self, state: &State) -> &Self::Output {
        &self.matrix[state.id]
    }
}

impl IndexMut<usize> for StartMatrix {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.matrix[index]
    }
}

impl IndexMut<&State> for StartMatrix {
    fn index_mut(&mut self, state: &State) -> &mut Self::Output {
        &mut self.matrix[state.id]
    }
}

#[cfg(test)]
mod tests_transition_matrix {
    use super::*;

    #[test]
    fn test_uniform_is_valid() {
        let transition_matrix = TransitionMatrix::new_uniform(3);
        assert!(transition_matrix.validate().is_ok());
        assert!((transition_matrix[(2, 1)] - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_index_by_state() {
        let mut transition_matrix = TransitionMatrix::new(vec![vec![0.0; 3]; 3]);
        let resting = State::new_1d(0, 0.5, 0.1).unwrap();
        let roaming = State::new_1d(1, 0.7, 0.2).unwrap();

        transition_matrix[(&resting, &roaming)] = 0.6;
        assert_eq!(transition_matrix[(0, 1)], 0.6);
    }

    #[test]
    fn test_not_square() {
        let transition_matrix = TransitionMatrix::new(vec![vec![0.5, 0.5], vec![0.3, 0.7], vec![0.1, 0.9]]);
        assert_eq!(transition_matrix.validate(), Err(MatrixValidationError::IncorrectShape));
    }

    #[test]
    fn test_zero_rows_reported() {
        let transition_matrix = TransitionMatrix::new(vec![vec![1.0, 0.0, 0.0], vec![0.0; 3], vec![0.0; 3]]);
        assert_eq!(transition_matrix.validate(), Err(MatrixValidationError::RowsEmpty { rows: vec![1, 2] }));

        let all_zero = TransitionMatrix::new(vec![vec![0.0; 2]; 2]);
        assert_eq!(all_zero.validate(), Err(MatrixValidationError::MatrixEmpty));
    }

    #[test]
    fn test_bad_row_sum() {
        let transition_matrix = TransitionMatrix::new(vec![vec![0.7, 0.7], vec![0.5, 0.5]]);

        match transition_matrix.validate() {
            Err(MatrixValidationError::RowsIncorrectValues { rows, values }) => {
                assert_eq!(rows, vec![0]);
                assert_eq!(values, vec![vec![0.7, 0.7]]);
            },
            other => panic!("Expected RowsIncorrectValues, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_value() {
        let transition_matrix = TransitionMatrix::new(vec![vec![1.5, 0.0], vec![0.0, -0.2]]);
        assert_eq!(transition_matrix.validate(), Err(MatrixValidationError::InvalidValue));
    }

}
