use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Time-ordered observation matrix, one row per sample and one column per feature.
///
/// A matrix with zero columns (or zero rows) can be built. The decoder reports it
/// as "no usable data".
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMatrix {
    data: DMatrix<f64>,
}

impl ObservationMatrix {
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ObservationError> {
        let num_features = rows.first().map(|row| row.len()).unwrap_or(0);

        for (row_id, row) in rows.iter().enumerate() {
            if row.len() != num_features {
                return Err(ObservationError::RaggedRow { row: row_id, expected: num_features, found: row.len() });
            }
        }

        let flat: Vec<f64> = rows.iter().flat_map(|row| row.iter().cloned()).collect();
        Self::from_dmatrix(DMatrix::from_row_slice(rows.len(), num_features, &flat))
    }

    // A one-dimensional series is treated as T x 1
    pub fn from_series(series: &[f64]) -> Result<Self, ObservationError> {
        Self::from_dmatrix(DMatrix::from_column_slice(series.len(), 1, series))
    }

    pub fn from_dmatrix(data: DMatrix<f64>) -> Result<Self, ObservationError> {
        for row in 0..data.nrows() {
            for column in 0..data.ncols() {
                if !data[(row, column)].is_finite() {
                    return Err(ObservationError::NonFiniteValue { row, column });
                }
            }
        }

        Ok(Self { data })
    }

    pub fn num_observations(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0 || self.data.ncols() == 0
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    // Iterate the features of row t in column order
    pub fn row(&self, t: usize) -> impl Iterator<Item = &f64> + '_ {
        (0..self.data.ncols()).map(move |column| &self.data[(t, column)])
    }

    pub fn row_vector(&self, t: usize) -> DVector<f64> {
        DVector::from_iterator(self.data.ncols(), self.row(t).cloned())
    }

    pub fn rows(&self) -> impl Iterator<Item = DVector<f64>> + '_ {
        (0..self.data.nrows()).map(move |t| self.row_vector(t))
    }

    pub fn feature_means(&self) -> DVector<f64> {
        let num_observations = self.num_observations().max(1) as f64;
        DVector::from_iterator(
            self.num_features(),
            self.data.column_iter().map(|column| column.sum() / num_observations),
        )
    }

    // Population variance of every feature
    pub fn feature_variances(&self) -> DVector<f64> {
        let means = self.feature_means();
        let num_observations = self.num_observations().max(1) as f64;

        DVector::from_iterator(
            self.num_features(),
            self.data.column_iter().zip(means.iter()).map(|(column, mean)| {
                column.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / num_observations
            }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("value at row {row}, column {column} is not finite")]
    NonFiniteValue { row: usize, column: usize },
}
