use nalgebra::DVector;
use thiserror::Error;

// ln(2 * pi), used by every Gaussian log density
const LN_TWO_PI: f64 = 1.837_877_066_409_345_5;

// Hidden state with a diagonal-covariance Gaussian emission
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: usize,
    pub mean: DVector<f64>,
    pub variance: DVector<f64>,
    pub name: Option<String>,
}

impl State {
    // Constructor to create a new State.
    // Name is always set to None when instantiating, use set_name to label it
    pub fn new(id: usize, mean: DVector<f64>, variance: DVector<f64>) -> Result<Self, StateError> {
        if mean.is_empty() {
            return Err(StateError::EmptyEmission);
        }

        if mean.len() != variance.len() {
            return Err(StateError::DimensionMismatch { mean: mean.len(), variance: variance.len() });
        }

        if let Some(feature) = mean.iter().position(|value| !value.is_finite()) {
            return Err(StateError::InvalidMeanInput { feature, input: mean[feature] });
        }

        // Diagonal covariance entries must be strictly positive
        if let Some(feature) = variance.iter().position(|value| !(value.is_finite() && *value > 0.0)) {
            return Err(StateError::InvalidVarianceInput { feature, input: variance[feature] });
        }

        Ok(State {
            id,
            mean,
            variance,
            name: None,
        })
    }

    // Single feature shortcut, mostly handy for synthetic tracks
    pub fn new_1d(id: usize, value: f64, noise_std: f64) -> Result<Self, StateError> {
        if noise_std <= 0.0 {
            return Err(StateError::InvalidVarianceInput { feature: 0, input: noise_std });
        }

        Self::new(id, DVector::from_element(1, value), DVector::from_element(1, noise_std * noise_std))
    }

    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get_mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn get_variance(&self) -> &DVector<f64> {
        &self.variance
    }

    pub fn num_features(&self) -> usize {
        self.mean.len()
    }

    // Log density of one observation row under this state's emission.
    // The observation must have num_features entries.
    pub fn log_emission_probability<'a, I>(&self, observation: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut log_prob = 0.0;
        let mut seen = 0;

        for ((value, mean), variance) in observation.into_iter().zip(self.mean.iter()).zip(self.variance.iter()) {
            let diff = value - mean;
            log_prob -= 0.5 * (LN_TWO_PI + variance.ln() + diff * diff / variance);
            seen += 1;
        }

        debug_assert_eq!(seen, self.num_features(), "observation length does not match state dimension");

        log_prob
    }

    pub fn emission_probability<'a, I>(&self, observation: I) -> f64
    where
        I: IntoIterator<Item = &'a f64>,
    {
        self.log_emission_probability(observation).exp()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("state emission needs at least one feature")]
    EmptyEmission,
    #[error("mean has {mean} features but variance has {variance}")]
    DimensionMismatch { mean: usize, variance: usize },
    #[error("mean of feature {feature} is not finite: {input}")]
    InvalidMeanInput { feature: usize, input: f64 },
    #[error("variance of feature {feature} must be finite and positive, got {input}")]
    InvalidVarianceInput { feature: usize, input: f64 },
}
