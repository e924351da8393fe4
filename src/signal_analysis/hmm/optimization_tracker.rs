pub struct OptimizationTracker {
    evals: Vec<f64>,
    iters: u32,

    termination_criterium: TerminationCriterium,
    converged: bool,
}

impl OptimizationTracker {
    pub fn new(termination_criterium: TerminationCriterium) -> Self {
        Self {
            evals: Vec::new(),
            iters: 0,
            termination_criterium,
            converged: false,
        }
    }

    pub fn max_iterations(&self) -> bool {
        match self.termination_criterium {
            TerminationCriterium::MaxIterations { max_iterations } |
            TerminationCriterium::OneStepConvergence { max_iterations, .. } |
            TerminationCriterium::OneStepConvergenceAbsolute { max_iterations, .. } => self.iters >= max_iterations,
        }
    }

    fn last_delta(&self) -> Option<(f64, f64)> {
        if self.iters < 2 {
            return None; // Need at least two evaluations to calculate delta
        }

        let curr = self.evals[self.iters as usize - 1];
        let prev = self.evals[self.iters as usize - 2];

        Some((curr, prev))
    }

    // Relative improvement of the last step is below epsilon
    pub fn one_step_convergence(&self) -> bool {
        if let TerminationCriterium::OneStepConvergence { epsilon, .. } = self.termination_criterium {
            if let Some((curr, prev)) = self.last_delta() {
                if prev.abs() < f64::EPSILON { return true }

                return (curr - prev) / prev.abs() < epsilon;
            }
        }

        false
    }

    // Absolute improvement of the last step is below epsilon.
    // A decrease also counts as converged.
    pub fn one_step_convergence_absolute(&self) -> bool {
        if let TerminationCriterium::OneStepConvergenceAbsolute { epsilon, .. } = self.termination_criterium {
            if let Some((curr, prev)) = self.last_delta() {
                return curr - prev < epsilon;
            }
        }

        false
    }

    // Record a new evaluation, returns true when the optimization should stop
    pub fn step(&mut self, new_eval: f64) -> bool {
        self.evals.push(new_eval);
        self.iters += 1;

        self.converged = self.one_step_convergence() || self.one_step_convergence_absolute();

        self.converged || self.max_iterations()
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> u32 {
        self.iters
    }

    pub fn history(&self) -> &[f64] {
        &self.evals
    }

    pub fn take_history(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.evals)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TerminationCriterium {
    MaxIterations { max_iterations: u32 }, // Stop once max iterations reached
    OneStepConvergence { epsilon: f64, max_iterations: u32 }, // Relative improvement below epsilon
    OneStepConvergenceAbsolute { epsilon: f64, max_iterations: u32 }, // Absolute improvement below epsilon
}

pub const DEFAULT_LOG_LIKELIHOOD_TOLERANCE: f64 = 1e-2;

impl TerminationCriterium {
    // Log-likelihood improvement below 0.01 or the iteration cap
    pub fn default_with_cap(max_iterations: u32) -> Self {
        TerminationCriterium::OneStepConvergenceAbsolute {
            epsilon: DEFAULT_LOG_LIKELIHOOD_TOLERANCE,
            max_iterations,
        }
    }

    pub fn max_iteration_count(&self) -> u32 {
        match self {
            TerminationCriterium::MaxIterations { max_iterations } |
            TerminationCriterium::OneStepConvergence { max_iterations, .. } |
            TerminationCriterium::OneStepConvergenceAbsolute { max_iterations, .. } => *max_iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_iterations_stops_at_cap() {
        let mut tracker = OptimizationTracker::new(TerminationCriterium::MaxIterations { max_iterations: 3 });

        assert!(!tracker.step(-10.0));
        assert!(!tracker.step(-5.0));
        assert!(tracker.step(-4.0));
        assert_eq!(tracker.iterations(), 3);
        assert!(!tracker.converged());
    }

    #[test]
    fn test_absolute_convergence() {
        let mut tracker = OptimizationTracker::new(TerminationCriterium::default_with_cap(100));

        assert!(!tracker.step(-100.0));
        assert!(!tracker.step(-50.0));
        assert!(tracker.step(-49.995));
        assert!(tracker.converged());
        assert_eq!(tracker.history(), &[-100.0, -50.0, -49.995]);
    }

    #[test]
    fn test_relative_convergence() {
        let mut tracker = OptimizationTracker::new(TerminationCriterium::OneStepConvergence { epsilon: 1e-3, max_iterations: 50 });

        assert!(!tracker.step(-100.0));
        assert!(!tracker.step(-90.0));
        assert!(tracker.step(-89.99));
        assert!(tracker.converged());
    }

    #[test]
    fn test_cap_applies_to_convergence_criteria() {
        let mut tracker = OptimizationTracker::new(TerminationCriterium::default_with_cap(2));

        assert!(!tracker.step(-100.0));
        assert!(tracker.step(-10.0));
        assert!(!tracker.converged());
        assert_eq!(TerminationCriterium::default_with_cap(2).max_iteration_count(), 2);
    }
}
