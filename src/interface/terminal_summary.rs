use std::collections::HashMap;
use std::hash::Hash;

use terminal_size::{terminal_size, Width};

use crate::transition_graph::EmpiricalTransitionMatrix;

const DEFAULT_TERMINAL_WIDTH: usize = 80;
const BAR_CHAR: char = '#';

/// Occurrences of each value, most frequent first; ties keep first-appearance order
pub fn value_counts<L: Clone + Eq + Hash>(values: &[L]) -> Vec<(L, usize)> {
    let mut order: Vec<L> = Vec::new();
    let mut counts: HashMap<L, usize> = HashMap::new();

    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value.clone());
        }
        *count += 1;
    }

    let mut result: Vec<(L, usize)> = order
        .into_iter()
        .map(|value| {
            let count = counts.get(&value).copied().unwrap_or(0);
            (value, count)
        })
        .collect();

    result.sort_by(|a, b| b.1.cmp(&a.1));
    result
}

pub fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), _)) => w as usize,
        None => DEFAULT_TERMINAL_WIDTH,
    }
}

/// One line per label: name, count and a bar scaled to `width` columns
pub fn render_counts(counts: &[(String, usize)], width: usize) -> String {
    let label_width = counts.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let count_width = counts.iter().map(|(_, count)| count.to_string().len()).max().unwrap_or(1);
    let max_count = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);

    let bar_space = width.saturating_sub(label_width + count_width + 4).max(1);

    let mut output = String::new();
    for (label, count) in counts {
        let bar_len = if max_count == 0 { 0 } else { (count * bar_space).div_ceil(max_count) };
        output.push_str(&format!(
            "{:<label_width$}  {:>count_width$}  {}\n",
            label,
            count,
            BAR_CHAR.to_string().repeat(bar_len),
            label_width = label_width,
            count_width = count_width,
        ));
    }

    output
}

/// Probability table with the label names as row and column headers
pub fn render_transition_matrix(matrix: &EmpiricalTransitionMatrix, labels: &[String]) -> String {
    let names: Vec<String> = (0..matrix.size())
        .map(|index| labels.get(index).cloned().unwrap_or_else(|| format!("#{}", index)))
        .collect();
    let column_width = names.iter().map(|name| name.len()).max().unwrap_or(0).max(6);

    let mut output = format!("{:column_width$}", "", column_width = column_width);
    for name in &names {
        output.push_str(&format!("  {:>column_width$}", name, column_width = column_width));
    }
    output.push('\n');

    for (name, row) in names.iter().zip(matrix.probabilities()) {
        output.push_str(&format!("{:<column_width$}", name, column_width = column_width));
        for value in row {
            output.push_str(&format!("  {:>column_width$.2}", value, column_width = column_width));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_counts_order() {
        let values = ["b", "a", "a", "c", "b", "a"];
        assert_eq!(value_counts(&values), vec![("a", 3), ("b", 2), ("c", 1)]);

        // Ties keep the order of first appearance
        assert_eq!(value_counts(&[2, 1, 1, 2]), vec![(2, 2), (1, 2)]);
        assert!(value_counts::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_render_counts_scales_bars() {
        let counts = vec![("Migration".to_string(), 4), ("Localized Movement".to_string(), 2)];
        let output = render_counts(&counts, 40);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        let long_bar = lines[0].matches(BAR_CHAR).count();
        let short_bar = lines[1].matches(BAR_CHAR).count();
        assert_eq!(long_bar, 40 - 18 - 1 - 4);
        assert_eq!(short_bar * 2, long_bar + long_bar % 2);
    }

    #[test]
    fn test_render_transition_matrix() {
        let matrix = EmpiricalTransitionMatrix::from_index_sequence(&[0, 1, 1], 2);
        let output = render_transition_matrix(&matrix, &["Rest".to_string(), "Move".to_string()]);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Rest"));
        assert!(lines[1].ends_with("1.00"));
        assert!(lines[2].contains("0.00"));
    }
}
