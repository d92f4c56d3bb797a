use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use arbor_forest::{
    BackendKind, ColumnKind, DrawPolicy, ForestConfig, LabelColumn, OobMode, RankedFeature,
    TrainingFrame,
};
use arbor_io::TableReader;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Bagged decision-tree forests over delimited tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Input table location and layout.
#[derive(Args, Debug, Clone)]
struct TableArgs {
    /// Path to the input table
    #[arg(long)]
    data: PathBuf,

    /// Field delimiter (a single ASCII character)
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Label column: "last", a zero-based index, or a header name
    #[arg(long, default_value = "last")]
    label_column: String,
}

#[derive(Subcommand)]
enum Command {
    /// Train a forest and report OOB accuracy and feature importances
    Train {
        #[command(flatten)]
        table: TableArgs,

        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        n_trees: usize,

        /// Maximum tree depth (unlimited if not set)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Minimum rows a node needs before it may split
        #[arg(long, default_value_t = 2)]
        min_samples_split: usize,

        /// Minimum rows on each side of a split
        #[arg(long, default_value_t = 1)]
        min_samples_leaf: usize,

        /// Minimum Gini decrease a split must exceed
        #[arg(long, default_value_t = 0.0)]
        min_impurity_decrease: f64,

        /// Draws per bootstrap sample (defaults to the number of data rows)
        #[arg(long)]
        sample_size: Option<usize>,

        /// What to do with draws that match no row: "discard" or "retry"
        #[arg(long, default_value = "discard")]
        draw_policy: String,

        /// Split scoring backend: "sequential" or "parallel"
        #[arg(long, default_value = "sequential")]
        backend: String,

        /// Evaluate the forest on out-of-bag rows
        #[arg(long, default_value_t = false)]
        oob: bool,
    },

    /// Print the inferred schema of a table
    Inspect {
        #[command(flatten)]
        table: TableArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    n_rows: usize,
    n_features: usize,
    n_trees: usize,
    classes: Vec<String>,
    sample_size: usize,
    n_discarded_draws: usize,
    oob_accuracy: Option<f64>,
    oob_rows: Option<usize>,
    oob_confusion: Option<Vec<Vec<usize>>>,
    importances: Vec<RankedFeature>,
}

#[derive(Serialize)]
struct InspectOutput {
    path: PathBuf,
    n_rows: usize,
    n_columns: usize,
    label_column: String,
    classes: Vec<String>,
    columns: Vec<ColumnOutput>,
}

#[derive(Serialize)]
struct ColumnOutput {
    index: usize,
    name: String,
    kind: ColumnKind,
    role: &'static str,
}

fn parse_label_column(s: &str) -> LabelColumn {
    match s {
        "last" => LabelColumn::Last,
        other => other
            .parse::<usize>()
            .map_or_else(|_| LabelColumn::Name(other.to_string()), LabelColumn::Index),
    }
}

fn parse_draw_policy(s: &str) -> Result<DrawPolicy> {
    match s {
        "discard" => Ok(DrawPolicy::Discard),
        "retry" => Ok(DrawPolicy::Retry),
        other => anyhow::bail!("unknown draw policy: {other} (expected discard or retry)"),
    }
}

fn parse_backend(s: &str) -> Result<BackendKind> {
    match s {
        "sequential" => Ok(BackendKind::Sequential),
        "parallel" => Ok(BackendKind::Parallel),
        other => anyhow::bail!("unknown backend: {other} (expected sequential or parallel)"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            table,
            n_trees,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            min_impurity_decrease,
            sample_size,
            draw_policy,
            backend,
            oob,
        } => {
            let label = parse_label_column(&table.label_column);
            let draw_policy = parse_draw_policy(&draw_policy)?;
            let backend = parse_backend(&backend)?;

            // 1. Read table
            let dataset = TableReader::new(&table.data)
                .with_delimiter(table.delimiter)
                .read()
                .context("failed to read input table")?;

            // 2. Train
            let oob_mode = if oob {
                OobMode::Enabled
            } else {
                OobMode::Disabled
            };
            let config = ForestConfig::new(n_trees)?
                .with_max_depth(max_depth)
                .with_min_samples_split(min_samples_split)
                .with_min_samples_leaf(min_samples_leaf)
                .with_min_impurity_decrease(min_impurity_decrease)
                .with_sample_size(sample_size)
                .with_draw_policy(draw_policy)
                .with_backend(backend)
                .with_oob_mode(oob_mode)
                .with_seed(cli.seed);
            let result = config
                .fit(&dataset, &label)
                .context("forest training failed")?;

            let oob_score = result.oob_score();
            info!(
                oob_accuracy = ?oob_score.map(|s| s.accuracy),
                "forest trained"
            );

            // 3. Print summary
            let meta = result.metadata();
            let output = TrainOutput {
                n_rows: meta.n_rows,
                n_features: meta.n_features,
                n_trees: meta.n_trees,
                classes: result.forest().classes().to_vec(),
                sample_size: meta.sample_size,
                n_discarded_draws: meta.n_discarded_draws,
                oob_accuracy: oob_score.map(|s| s.accuracy),
                oob_rows: oob_score.map(|s| s.n_oob_rows),
                oob_confusion: oob_score.map(|s| s.confusion.as_rows().to_vec()),
                importances: result.importances(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { table } => {
            let label = parse_label_column(&table.label_column);
            let dataset = TableReader::new(&table.data)
                .with_delimiter(table.delimiter)
                .read()
                .context("failed to read input table")?;
            let frame = TrainingFrame::new(&dataset, &label)
                .context("failed to resolve label column")?;
            let schema = frame.schema();
            let label_index = schema.label_column().index();

            let columns = dataset
                .header()
                .iter()
                .zip(dataset.kinds())
                .enumerate()
                .map(|(index, (name, kind))| ColumnOutput {
                    index,
                    name: name.clone(),
                    kind: *kind,
                    role: match index {
                        0 => "id",
                        i if i == label_index => "label",
                        _ => "feature",
                    },
                })
                .collect();

            let output = InspectOutput {
                path: table.data,
                n_rows: dataset.n_data_rows(),
                n_columns: dataset.column_count(),
                label_column: dataset.header()[label_index].clone(),
                classes: schema.classes().to_vec(),
                columns,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
