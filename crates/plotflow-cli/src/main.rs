//! plotflow pipeline CLI.
//!
//! Provides the `plotflow` binary for working with pipeline definition files
//! (see `plotflow_core::definition`). Every subcommand loads the file into a
//! fresh registry and builds the verified graph first, so a broken pipeline
//! is reported the same way whichever subcommand is used.
//!
//! Logging goes to stderr. The level is taken from `-v`/`-vv`, or from the
//! `PLOTFLOW_LOG` environment variable (e.g. `PLOTFLOW_LOG=debug`), and
//! defaults to `warn`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use plotflow_core::{
    to_dot, CoreError, DefinitionError, DotOptions, NodeId, Orientation, PipelineDefinition,
    VerifiedGraph,
};

/// Pipeline dependency validation and visualization tools.
#[derive(Parser)]
#[command(name = "plotflow", about = "Pipeline dependency validation and visualization")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). Without it, the level
    /// comes from PLOTFLOW_LOG, falling back to warn.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline and print a JSON summary.
    Check {
        /// Path to the pipeline definition file.
        file: PathBuf,
    },

    /// Print a topological order of the pipeline steps.
    Order {
        /// Path to the pipeline definition file.
        file: PathBuf,

        /// Print one layer per line instead of a flat order.
        #[arg(long)]
        layers: bool,
    },

    /// Render the pipeline as Graphviz DOT.
    Dot {
        /// Path to the pipeline definition file.
        file: PathBuf,

        /// Layout direction: vertical or horizontal.
        #[arg(long, default_value = "vertical", value_parser = parse_orientation)]
        orientation: Orientation,

        /// Graph caption; pass an empty string to omit it.
        #[arg(long, default_value = "Pipeline Flow")]
        title: String,

        /// Node fill color.
        #[arg(long, default_value = "#cceeff")]
        node_color: String,

        /// Node label font size.
        #[arg(long, default_value_t = 10)]
        font_size: u32,

        /// Write DOT to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the verified graph as JSON.
    Export {
        /// Path to the pipeline definition file.
        file: PathBuf,
    },
}

/// Errors surfaced by the CLI, each mapped to an exit code.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// 1 = the pipeline is invalid, 3 = I/O or parse failure.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation(_) | CliError::Definition(DefinitionError::Core(_)) => 1,
            CliError::Definition(_) | CliError::Write { .. } | CliError::Json(_) => 3,
        }
    }
}

/// Machine-readable result of `plotflow check`.
#[derive(Debug, Serialize)]
struct CheckSummary {
    nodes: usize,
    edges: usize,
    roots: Vec<NodeId>,
    sinks: Vec<NodeId>,
    order: Vec<NodeId>,
    fingerprint: String,
}

impl CheckSummary {
    fn of(graph: &VerifiedGraph) -> Self {
        CheckSummary {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            roots: graph.roots(),
            sinks: graph.sinks(),
            order: graph.topological_order(),
            fingerprint: graph.fingerprint().to_hex().to_string(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli.command) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let env = std::env::var("PLOTFLOW_LOG").ok();
    let (level, rejected) = log_level(verbose, env.as_deref());
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    if let Some(value) = rejected {
        tracing::warn!(value, "ignoring unrecognized PLOTFLOW_LOG level, using warn");
    }
}

/// Picks the log level from `-v` count, then `PLOTFLOW_LOG`. Also returns
/// the environment value when it was set but could not be parsed.
fn log_level(verbose: u8, env: Option<&str>) -> (Level, Option<&str>) {
    match verbose {
        0 => match env {
            Some(value) => match value.parse::<Level>() {
                Ok(level) => (level, None),
                Err(_) => (Level::WARN, Some(value)),
            },
            None => (Level::WARN, None),
        },
        1 => (Level::DEBUG, None),
        _ => (Level::TRACE, None),
    }
}

/// Execute a subcommand.
fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Check { file } => {
            let graph = load_graph(&file)?;
            println!("{}", serde_json::to_string_pretty(&CheckSummary::of(&graph))?);
        }
        Commands::Order { file, layers } => {
            let graph = load_graph(&file)?;
            print!("{}", render_order(&graph, layers));
        }
        Commands::Dot {
            file,
            orientation,
            title,
            node_color,
            font_size,
            output,
        } => {
            let graph = load_graph(&file)?;
            let options = DotOptions {
                orientation,
                title,
                node_color,
                font_size,
                ..DotOptions::default()
            };
            let dot = to_dot(&graph, &options);
            match output {
                Some(path) => {
                    std::fs::write(&path, dot).map_err(|source| CliError::Write {
                        path: path.clone(),
                        source,
                    })?;
                    tracing::info!(path = %path.display(), "pipeline flow written");
                }
                None => print!("{}", dot),
            }
        }
        Commands::Export { file } => {
            let graph = load_graph(&file)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
    }
    Ok(())
}

/// Loads a definition file into a fresh registry and builds its graph.
fn load_graph(path: &Path) -> Result<VerifiedGraph, CliError> {
    let registry = PipelineDefinition::load(path)?.to_registry()?;
    let graph = registry.build()?;
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "pipeline is valid"
    );
    Ok(graph)
}

/// Formats the topological order: space-separated on one line, or one
/// layer per line.
fn render_order(graph: &VerifiedGraph, layers: bool) -> String {
    fn join(ids: &[NodeId]) -> String {
        ids.iter()
            .map(NodeId::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    if layers {
        graph
            .layers()
            .iter()
            .map(|layer| format!("{}\n", join(layer)))
            .collect()
    } else {
        format!("{}\n", join(&graph.topological_order()))
    }
}

/// Parse an orientation string to `Orientation`.
fn parse_orientation(s: &str) -> Result<Orientation, String> {
    match s {
        "vertical" | "v" | "TB" => Ok(Orientation::Vertical),
        "horizontal" | "h" | "LR" => Ok(Orientation::Horizontal),
        _ => Err(format!(
            "invalid orientation '{}', expected vertical or horizontal",
            s
        )),
    }
}
