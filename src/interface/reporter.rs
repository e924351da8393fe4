use serde::Serialize;

use crate::data_loading::NumericTable;
use crate::signal_analysis::hmm::decoder::DecodedSequence;
use crate::transition_graph::{EmpiricalTransitionMatrix, TransitionGraph};

use std::fs::{File, create_dir_all};
use std::io::{Write, BufWriter};
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "analysis_report.txt";
pub const JSON_FILE_NAME: &str = "analysis.json";

/// Everything one run produced for a sheet
#[derive(Debug, Serialize)]
pub struct AnalysisOutput<'a> {
    pub sheet: &'a str,
    pub columns: &'a [String],
    pub dropped_rows: usize,
    pub decoded: &'a DecodedSequence,
    pub transition_matrix: &'a EmpiricalTransitionMatrix,
    pub transition_graph: &'a TransitionGraph<String>,
}

/// Reporter struct for managing report generation
pub struct Reporter {
    pub path: PathBuf, // Directory to store the output files
}

impl Reporter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Write the text report, returns where it was stored
    pub fn report(&self, output: &AnalysisOutput) -> std::io::Result<PathBuf> {
        // Ensure the directory exists
        create_dir_all(&self.path)?;

        let file_path = self.file_path(REPORT_FILE_NAME);
        let file = File::create(&file_path)?;
        let mut writer = BufWriter::new(file);

        self.write_report(&mut writer, output)?;
        writer.flush()?;

        Ok(file_path)
    }

    pub fn write_report<W: Write>(&self, writer: &mut W, output: &AnalysisOutput) -> std::io::Result<()> {
        let decoded = output.decoded;
        let model = &decoded.model;

        writeln!(writer, "Movement State Report")?;
        writeln!(writer, "=====================")?;
        writeln!(writer)?;
        writeln!(writer, "Sheet: {}", output.sheet)?;
        writeln!(writer, "Features: {}", output.columns.join(", "))?;
        writeln!(writer, "Time steps: {} ({} incomplete rows dropped)", decoded.len(), output.dropped_rows)?;
        writeln!(writer)?;

        // Fit summary
        writeln!(writer, "[Fit]")?;
        writeln!(writer, "Iterations: {}", decoded.iterations)?;
        writeln!(writer, "Converged: {}", decoded.converged)?;
        writeln!(writer, "Log-likelihood: {:.4}", decoded.log_likelihood)?;
        writeln!(writer, "Viterbi log-probability: {:.4}", decoded.log_probability)?;
        writeln!(writer)?;

        // Report states
        writeln!(writer, "[States]")?;
        writeln!(writer, "ID,Mean,Variance,Occupancy")?;
        for (id, (mean, variance)) in model.means.iter().zip(&model.variances).enumerate() {
            let occupancy = decoded.state_occupancy.get(id).copied().unwrap_or(0.0);
            writeln!(writer, "{},{},{},{:.3}", id, join_values(mean), join_values(variance), occupancy)?;
        }
        writeln!(writer)?;

        // Report start matrix
        writeln!(writer, "[Start Matrix]")?;
        writeln!(writer, "State ID,Start Probability")?;
        for (i, &value) in model.start_probabilities.iter().enumerate() {
            writeln!(writer, "{},{:.3}", i, value)?;
        }
        writeln!(writer)?;

        // Report fitted transition matrix
        writeln!(writer, "[Transition Matrix]")?;
        writeln!(
            writer,
            "From State \\ To State,{}",
            (0..model.transition_probabilities.len())
                .map(|i| format!("State {}", i))
                .collect::<Vec<_>>()
                .join(",")
        )?;
        for (from, row) in model.transition_probabilities.iter().enumerate() {
            writeln!(writer, "State {},{}", from, join_values(row))?;
        }
        writeln!(writer)?;

        // Report the empirical transitions between decoded labels
        writeln!(writer, "[Empirical Transitions]")?;
        let digraph = output.transition_graph.to_digraph();
        for edge in digraph.edge_indices() {
            if let Some((from, to)) = digraph.edge_endpoints(edge) {
                writeln!(writer, "{} -> {},{:.2}", digraph[from], digraph[to], digraph[edge])?;
            }
        }
        writeln!(writer)?;

        // Per time step data
        writeln!(writer, "[Sequence]")?;
        writeln!(writer, "Step,State ID,Label")?;
        for (step, (state_id, label)) in decoded.state_ids.iter().zip(&decoded.labels).enumerate() {
            writeln!(writer, "{},{},{}", step, state_id, label)?;
        }

        Ok(())
    }

    pub fn write_json(&self, output: &AnalysisOutput) -> std::io::Result<PathBuf> {
        create_dir_all(&self.path)?;

        let file_path = self.file_path(JSON_FILE_NAME);
        let writer = BufWriter::new(File::create(&file_path)?);
        serde_json::to_writer_pretty(writer, output)?;

        Ok(file_path)
    }
}

fn join_values(values: &[f64]) -> String {
    values.iter().map(|value| format!("{:.3}", value)).collect::<Vec<_>>().join(" ")
}

/// Borrowing constructor so callers do not have to spell out every field
pub fn analysis_output<'a>(
    sheet: &'a str,
    table: &'a NumericTable,
    decoded: &'a DecodedSequence,
    transition_matrix: &'a EmpiricalTransitionMatrix,
    transition_graph: &'a TransitionGraph<String>,
) -> AnalysisOutput<'a> {
    AnalysisOutput {
        sheet,
        columns: &table.columns,
        dropped_rows: table.dropped_rows,
        decoded,
        transition_matrix,
        transition_graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_analysis::hmm::decoder::FittedModel;
    use crate::transition_graph::build_transition_graph;

    fn decoded() -> DecodedSequence {
        DecodedSequence {
            state_ids: vec![0, 0, 1],
            labels: vec!["Localized Movement".to_string(), "Localized Movement".to_string(), "Exploratory Movement".to_string()],
            log_probability: -3.5,
            log_likelihood: -3.2,
            log_likelihood_history: vec![-5.0, -3.2],
            iterations: 2,
            converged: true,
            state_occupancy: vec![2.0 / 3.0, 1.0 / 3.0],
            model: FittedModel {
                means: vec![vec![1.0], vec![5.0]],
                variances: vec![vec![0.1], vec![0.2]],
                start_probabilities: vec![1.0, 0.0],
                transition_probabilities: vec![vec![0.5, 0.5], vec![0.0, 1.0]],
            },
        }
    }

    fn table() -> NumericTable {
        NumericTable { columns: vec!["speed".to_string()], rows: vec![vec![1.0], vec![1.1], vec![5.0]], dropped_rows: 1 }
    }

    #[test]
    fn test_write_report_sections() {
        let decoded = decoded();
        let table = table();
        let (matrix, graph) = build_transition_graph(&decoded.labels, 3);
        let output = analysis_output("tracks", &table, &decoded, &matrix, &graph);

        let mut buffer = Vec::new();
        Reporter::new(Path::new(".")).write_report(&mut buffer, &output).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Sheet: tracks"));
        assert!(text.contains("1 incomplete rows dropped"));
        assert!(text.contains("Localized Movement -> Exploratory Movement,0.50"));
        assert!(text.contains("2,1,Exploratory Movement"));
    }

    // One line per directed edge, self-loops included
    #[test]
    fn test_empirical_transitions_follow_graph() {
        let decoded = decoded();
        let table = table();
        let (matrix, graph) = build_transition_graph(&decoded.labels, 3);
        let output = analysis_output("tracks", &table, &decoded, &matrix, &graph);

        let mut buffer = Vec::new();
        Reporter::new(Path::new(".")).write_report(&mut buffer, &output).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let section: Vec<&str> = text
            .lines()
            .skip_while(|line| *line != "[Empirical Transitions]")
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();

        assert_eq!(section.len(), graph.edge_count());
        assert_eq!(section[0], "Localized Movement -> Localized Movement,0.50");
        assert!(section.iter().all(|line| !line.starts_with("Exploratory Movement")));
    }

    #[test]
    fn test_files_written() {
        let dir = tempfile::tempdir().unwrap();
        let decoded = decoded();
        let table = table();
        let (matrix, graph) = build_transition_graph(&decoded.labels, 3);
        let output = analysis_output("tracks", &table, &decoded, &matrix, &graph);
        let reporter = Reporter::new(&dir.path().join("out"));

        let report_path = reporter.report(&output).unwrap();
        let json_path = reporter.write_json(&output).unwrap();

        assert!(report_path.exists());
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(json["sheet"], "tracks");
        assert_eq!(json["decoded"]["state_ids"], serde_json::json!([0, 0, 1]));
    }
}
