use std::collections::HashMap;
use std::hash::Hash;

/// Dense indices for labels, assigned in order of first appearance.
#[derive(Debug, Clone)]
pub struct LabelIndex<L> {
    labels: Vec<L>,
    positions: HashMap<L, usize>,
}

impl<L: Clone + Eq + Hash> LabelIndex<L> {
    pub fn from_sequence(sequence: &[L]) -> Self {
        let mut labels = Vec::new();
        let mut positions = HashMap::new();

        for label in sequence {
            if !positions.contains_key(label) {
                positions.insert(label.clone(), labels.len());
                labels.push(label.clone());
            }
        }

        Self { labels, positions }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &L) -> Option<usize> {
        self.positions.get(label).copied()
    }

    pub fn label_at(&self, index: usize) -> Option<&L> {
        self.labels.get(index)
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    // Every label of the sequence must already be indexed
    pub fn encode(&self, sequence: &[L]) -> Vec<usize> {
        sequence.iter().filter_map(|label| self.index_of(label)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_order() {
        let index = LabelIndex::from_sequence(&["Migration", "Localized Movement", "Migration", "Exploratory Movement"]);

        assert_eq!(index.labels(), &["Migration", "Localized Movement", "Exploratory Movement"]);
        assert_eq!(index.index_of(&"Localized Movement"), Some(1));
        assert_eq!(index.index_of(&"Unknown State"), None);
        assert_eq!(index.label_at(2), Some(&"Exploratory Movement"));
    }

    #[test]
    fn test_encode() {
        let sequence = [3, 3, 7, 1, 7];
        let index = LabelIndex::from_sequence(&sequence);
        assert_eq!(index.encode(&sequence), vec![0, 0, 1, 2, 1]);
    }

    fn cloned_index<L: Clone + Eq + Hash>(sequence: &[L]) -> LabelIndex<L> {
        let index = LabelIndex::from_sequence(sequence);
        index.clone()
    }

    // Owned labels through a generic caller, as the graph builder uses it
    #[test]
    fn test_generic_owned_labels() {
        let sequence: Vec<String> = ["Resting", "Roaming", "Resting"].iter().map(|label| label.to_string()).collect();
        let index = cloned_index(&sequence);

        assert_eq!(index.len(), 2);
        assert_eq!(index.index_of(&"Roaming".to_string()), Some(1));
        assert!(format!("{:?}", index).contains("Resting"));
    }
}
