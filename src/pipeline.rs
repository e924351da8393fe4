//! Sheet -> numeric table -> decoded labels -> transition graph.

use tracing::{info, warn};

use crate::data_loading::{NumericTable, Sheet};
use crate::interface::terminal_summary::value_counts;
use crate::signal_analysis::hmm::decoder::{decode, DecodeError, DecodedSequence, DecoderSetup};
use crate::transition_graph::{build_transition_graph, EmpiricalTransitionMatrix, TransitionGraph};

#[derive(Debug, Clone)]
pub struct SheetAnalysis {
    pub table: NumericTable,
    pub decoded: DecodedSequence,
    pub label_counts: Vec<(String, usize)>,
    pub transition_matrix: EmpiricalTransitionMatrix,
    pub transition_graph: TransitionGraph<String>,
}

pub fn analyze_table(table: NumericTable, setup: &DecoderSetup) -> Result<SheetAnalysis, DecodeError> {
    if table.num_columns() == 0 {
        warn!("No numerical data available in this dataset");
        return Err(DecodeError::NoUsableData { reason: "no numeric columns".to_string() });
    }

    let observations = table.to_observations().map_err(|error| DecodeError::InvalidObservations { error })?;
    let decoded = decode(&observations, setup)?;

    let label_counts = value_counts(&decoded.labels);
    let (transition_matrix, transition_graph) = build_transition_graph(&decoded.labels, setup.num_states);

    Ok(SheetAnalysis { table, decoded, label_counts, transition_matrix, transition_graph })
}

pub fn analyze_sheet(sheet: &Sheet, setup: &DecoderSetup) -> Result<SheetAnalysis, DecodeError> {
    let table = sheet.numeric_sub_table();

    info!(
        "Sheet '{}': {} numeric columns, {} complete rows, {} rows dropped",
        sheet.name(),
        table.num_columns(),
        table.num_rows(),
        table.dropped_rows
    );

    analyze_table(table, setup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loading::read_sheet;

    #[test]
    fn test_analyze_sheet() {
        let csv = "tiger,speed\nA,1.0\nA,1.1\nA,\nB,1.0\nB,5.0\nB,5.1\nC,5.2\n";
        let sheet = read_sheet("tracks", csv.as_bytes()).unwrap();
        let setup = DecoderSetup { num_states: 2, ..DecoderSetup::default() }.with_seed(2);

        let analysis = analyze_sheet(&sheet, &setup).unwrap();

        assert_eq!(analysis.table.dropped_rows, 1);
        assert_eq!(analysis.decoded.len(), 6);
        assert_eq!(analysis.label_counts.iter().map(|(_, count)| count).sum::<usize>(), 6);
        assert!(analysis.transition_matrix.is_row_stochastic(1e-9));
        assert_eq!(analysis.transition_graph.node_count(), 2);
    }

    #[test]
    fn test_text_only_sheet_is_no_data() {
        let sheet = read_sheet("names", "name\nRaja\n".as_bytes()).unwrap();
        let result = analyze_sheet(&sheet, &DecoderSetup::default());

        assert!(matches!(result, Err(DecodeError::NoUsableData { .. })));
    }
}
