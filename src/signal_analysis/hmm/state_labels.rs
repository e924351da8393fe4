use serde::{Deserialize, Serialize};

pub const UNKNOWN_STATE: &str = "Unknown State";

/// Semantic names for decoded state indices.
///
/// Index `i` is labeled `names[i]`. Any index past the end of the table is
/// labeled [`UNKNOWN_STATE`], it never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateLabels {
    names: Vec<String>,
}

impl StateLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Tiger movement vocabulary
    pub fn movement_defaults() -> Self {
        Self::new(vec![
            "Localized Movement".to_string(),
            "Exploratory Movement".to_string(),
            "Migration".to_string(),
        ])
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn label_for(&self, state_id: usize) -> &str {
        self.names.get(state_id).map(String::as_str).unwrap_or(UNKNOWN_STATE)
    }

    pub fn label_sequence(&self, state_ids: &[usize]) -> Vec<String> {
        state_ids.iter().map(|&state_id| self.label_for(state_id).to_string()).collect()
    }
}

impl Default for StateLabels {
    fn default() -> Self {
        Self::movement_defaults()
    }
}
