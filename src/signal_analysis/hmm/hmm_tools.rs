use std::ops::{Index, IndexMut};

use super::state::State;

// Row-per-state container used for every K x T or K x K quantity in the HMM
#[derive(Debug, Clone, PartialEq)]
pub struct StateMatrix2D<T> {
    pub raw_matrix: Vec<Vec<T>>,
}

impl<T: Clone + Default> StateMatrix2D<T> {
    pub fn new(raw_matrix: Vec<Vec<T>>) -> Self {
        Self { raw_matrix }
    }

    // Shape is (rows, columns)
    pub fn empty(shape: (usize, usize)) -> Self {
        Self {
            raw_matrix: vec![vec![T::default(); shape.1]; shape.0],
        }
    }

    pub fn filled(shape: (usize, usize), value: T) -> Self {
        Self {
            raw_matrix: vec![vec![value; shape.1]; shape.0],
        }
    }

    pub fn len(&self) -> usize {
        self.raw_matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_matrix.is_empty()
    }

    pub fn shape(&self) -> (usize, usize) {
        let columns = self.raw_matrix.first().map(|row| row.len()).unwrap_or(0);
        (self.raw_matrix.len(), columns)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<T>> {
        self.raw_matrix.iter()
    }
}

impl<T> Index<usize> for StateMatrix2D<T> {
    type Output = Vec<T>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.raw_matrix[index]
    }
}

impl<T> IndexMut<usize> for StateMatrix2D<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.raw_matrix[index]
    }
}

impl<T> Index<&State> for StateMatrix2D<T> {
    type Output = Vec<T>;

    fn index(&self, state: &State) -> &Self::Output {
        &self.raw_matrix[state.id]
    }
}

impl<T> IndexMut<&State> for StateMatrix2D<T> {
    fn index_mut(&mut self, state: &State) -> &mut Self::Output {
        &mut self.raw_matrix[state.id]
    }
}

// ln(sum(exp(values))) without overflow. All -inf gives -inf.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }

    let sum: f64 = values.iter().map(|value| (value - max).exp()).sum();
    max + sum.ln()
}

// Natural log that maps 0 to -inf instead of producing NaN warnings downstream
pub fn safe_ln(value: f64) -> f64 {
    if value <= 0.0 {
        f64::NEG_INFINITY
    } else {
        value.ln()
    }
}
