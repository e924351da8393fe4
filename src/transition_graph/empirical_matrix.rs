use serde::Serialize;

/// First-order transition counts between label indices and their
/// row-normalized probabilities. Rows without outgoing transitions stay zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmpiricalTransitionMatrix {
    counts: Vec<Vec<u64>>,
    probabilities: Vec<Vec<f64>>,
}

impl EmpiricalTransitionMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            counts: vec![vec![0; size]; size],
            probabilities: vec![vec![0.0; size]; size],
        }
    }

    // Indices must be smaller than size
    pub fn from_index_sequence(indices: &[usize], size: usize) -> Self {
        let mut counts = vec![vec![0_u64; size]; size];

        for pair in indices.windows(2) {
            counts[pair[0]][pair[1]] += 1;
        }

        let probabilities = counts
            .iter()
            .map(|row| {
                let total: u64 = row.iter().sum();
                if total == 0 {
                    vec![0.0; size]
                } else {
                    row.iter().map(|&count| count as f64 / total as f64).collect()
                }
            })
            .collect();

        Self { counts, probabilities }
    }

    pub fn size(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn probabilities(&self) -> &[Vec<f64>] {
        &self.probabilities
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.probabilities[from][to]
    }

    pub fn row(&self, from: usize) -> &[f64] {
        &self.probabilities[from]
    }

    pub fn total_transitions(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn zero_rows(&self) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&count| count == 0))
            .map(|(index, _)| index)
            .collect()
    }

    // Each row sums to 1 within tolerance or is exactly zero
    pub fn is_row_stochastic(&self, tolerance: f64) -> bool {
        self.probabilities.iter().all(|row| {
            let sum: f64 = row.iter().sum();
            row.iter().all(|value| value.is_finite() && *value >= 0.0)
                && ((sum - 1.0).abs() <= tolerance || row.iter().all(|&value| value == 0.0))
        })
    }
}
