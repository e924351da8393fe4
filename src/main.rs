use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use migration_lib::config::AnalysisConfig;
use migration_lib::data_loading::load_workbook;
use migration_lib::interface::diagram::{plot_state_counts, plot_transition_diagram};
use migration_lib::interface::reporter::{analysis_output, Reporter};
use migration_lib::interface::terminal_summary::{render_counts, render_transition_matrix, terminal_width};
use migration_lib::pipeline::analyze_sheet;

const STATE_COUNTS_FILE_NAME: &str = "state_counts.png";
const TRANSITION_DIAGRAM_FILE_NAME: &str = "transition_diagram.png";

/// Predict movement states of tracked animals with a Gaussian HMM
#[derive(Parser, Debug)]
#[command(name = "migration-lib")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Excel workbook, CSV file, or a directory of CSV files (one sheet each)
    #[arg(short, long)]
    input: PathBuf,

    /// Sheet to analyze, defaults to the first one
    #[arg(short, long)]
    sheet: Option<String>,

    /// Number of hidden states
    #[arg(long)]
    states: Option<usize>,

    /// Baum-Welch iteration cap
    #[arg(long)]
    iterations: Option<u32>,

    /// Seed for the initialization, runs are reproducible when set
    #[arg(long, env = "MIGRATION_SEED")]
    seed: Option<u64>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where charts and reports are written
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write analysis.json
    #[arg(long)]
    json: bool,
}

impl Cli {
    // Flags win over the config file
    fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(states) = self.states { config.num_states = states; }
        if let Some(iterations) = self.iterations { config.max_iterations = iterations; }
        if let Some(seed) = self.seed { config.seed = Some(seed); }
        if let Some(output_dir) = &self.output_dir { config.output.directory = output_dir.clone(); }
        if self.json { config.output.json = true; }

        config.validate().context("invalid analysis settings")?;

        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let workbook = load_workbook(&cli.input).with_context(|| format!("loading {}", cli.input.display()))?;

    let sheet = match &cli.sheet {
        Some(name) => workbook
            .sheet(name)
            .ok_or_else(|| anyhow!("no sheet named '{}', available: {}", name, workbook.sheet_names().join(", ")))?,
        None => workbook.first().ok_or_else(|| anyhow!("workbook has no sheets"))?,
    };

    println!("## Data from Sheet: {}", sheet.name());
    println!("{}", sheet.head(config.output.head_rows));

    let setup = config.decoder_setup();
    let analysis = match analyze_sheet(sheet, &setup) {
        Ok(analysis) => analysis,
        Err(error) if error.is_no_data() => {
            warn!("{}", error);
            println!("No numerical data available in this dataset.");
            return Ok(());
        }
        Err(error) => bail!("state prediction failed for sheet '{}': {}", sheet.name(), error),
    };

    println!("## Predicted Migration Patterns");
    println!("{}", render_counts(&analysis.label_counts, terminal_width()));

    println!("### Finite State Machine Representation");
    let node_labels: Vec<String> = analysis.transition_graph.nodes().iter().map(|node| node.label.clone()).collect();
    println!("{}", render_transition_matrix(&analysis.transition_matrix, &node_labels));

    let reporter = Reporter::new(&config.output.directory);
    let output = analysis_output(
        sheet.name(),
        &analysis.table,
        &analysis.decoded,
        &analysis.transition_matrix,
        &analysis.transition_graph,
    );

    let report_path = reporter.report(&output).context("writing the text report")?;
    info!("Report stored at {}", report_path.display());

    let counts_path = reporter.file_path(STATE_COUNTS_FILE_NAME);
    plot_state_counts(&counts_path, &analysis.label_counts)
        .map_err(|error| anyhow!("drawing {}: {}", counts_path.display(), error))?;

    let diagram_path = reporter.file_path(TRANSITION_DIAGRAM_FILE_NAME);
    plot_transition_diagram(&diagram_path, &analysis.transition_graph)
        .map_err(|error| anyhow!("drawing {}: {}", diagram_path.display(), error))?;
    info!("Charts stored at {} and {}", counts_path.display(), diagram_path.display());

    if config.output.json {
        let json_path = reporter.write_json(&output).context("writing the JSON output")?;
        info!("JSON output stored at {}", json_path.display());
    }

    Ok(())
}
