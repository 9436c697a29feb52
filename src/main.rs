// Command-line entry point for callforest.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use callforest::api::server::{self, ForestServer};
use callforest::application::{AnalyzeUsecase, ForestPipeline};
use callforest::config::ForestConfig;
use callforest::domain::layer::LayerType;
use callforest::domain::query::TreeQueryService;
use callforest::domain::store::{DiskForestStore, ForestStore};
use callforest::infrastructure::{concurrency, JsonForestExporter, JsonInventorySource};
use callforest::ports::tree_dot_exporter::TreeDotExporter;
use callforest::ports::ForestExporter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Call-tree forest analysis over an extracted code inventory",
    long_about = None
)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the forest from a JSON inventory and write a report
    Build {
        /// Inventory JSON produced by the source extractor
        #[arg(short, long)]
        inventory: PathBuf,

        /// Report path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,

        /// Include trees, relations and core paths in the report
        #[arg(long)]
        include_forest: bool,

        /// Also write one tree as Graphviz DOT
        #[arg(long)]
        dot: Option<PathBuf>,

        /// Tree for --dot (heaviest tree when omitted)
        #[arg(long)]
        tree: Option<String>,

        /// Snapshot store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Snapshot name inside --store
        #[arg(long, default_value = "latest")]
        snapshot: String,

        /// Worker threads for tree construction
        #[arg(long)]
        threads: Option<usize>,

        /// Layers not expanded during traversal (replaces the configured list)
        #[arg(long, value_delimiter = ',', value_parser = parse_layer)]
        prune: Vec<LayerType>,
    },
    /// Query a stored snapshot
    Query {
        #[arg(long)]
        store: PathBuf,

        #[arg(long, default_value = "latest")]
        snapshot: String,

        #[command(subcommand)]
        query: QueryKind,
    },
    /// Serve queries over TCP (line-delimited JSON)
    Serve {
        #[arg(short, long, default_value_t = 4590)]
        port: u16,

        /// Preload a snapshot from this store
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long, default_value = "latest")]
        snapshot: String,
    },
}

#[derive(Subcommand, Debug)]
enum QueryKind {
    /// Trees containing a method
    Trees { method: String },
    /// Core paths ending at a method
    Paths { method: String },
    /// Full structure of one tree
    Structure { tree: String },
    /// Forest-wide statistics
    Overview,
}

fn parse_layer(s: &str) -> std::result::Result<LayerType, String> {
    LayerType::parse(s).ok_or_else(|| {
        let known: Vec<&str> = LayerType::ALL.iter().map(LayerType::name).collect();
        format!("unknown layer '{}' (expected one of: {})", s, known.join(", "))
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ForestConfig> {
    match path {
        Some(path) => ForestConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ForestConfig::default()),
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Build {
            inventory,
            output,
            pretty,
            include_forest,
            dot,
            tree,
            store,
            snapshot,
            threads,
            prune,
        } => {
            let mut config = config;
            if !prune.is_empty() {
                config.build.prune_layers = prune;
            }
            let pipeline = ForestPipeline::new(config);
            if pipeline.config().build.parallel {
                concurrency::init_thread_pool(threads)?;
            }
            let source = JsonInventorySource::new(&inventory);
            let exporter = JsonForestExporter {
                pretty,
                include_forest,
            };
            let usecase = AnalyzeUsecase {
                source: &source,
                exporter: &exporter,
            };
            let mut out = open_output(output.as_ref())?;
            let analysis = usecase.run(&pipeline, &mut out)?;
            out.flush()?;

            if let Some(dot_path) = dot {
                let mut file = File::create(&dot_path)
                    .with_context(|| format!("Cannot create {}", dot_path.display()))?;
                let exporter = tree
                    .as_deref()
                    .map(TreeDotExporter::for_tree)
                    .unwrap_or_default();
                exporter.export(&analysis, &mut file)?;
                info!("DOT written to {}", dot_path.display());
            }
            if let Some(store_path) = store {
                let store = DiskForestStore::open(&store_path)?;
                store.save(&snapshot, &analysis.snapshot())?;
                info!("Snapshot '{}' saved to {}", snapshot, store_path.display());
            }
            info!(
                "Analysis completed: {} trees, {} core paths",
                analysis.forest.trees.len(),
                analysis.forest.core_paths.len()
            );
        }
        Command::Query {
            store,
            snapshot,
            query,
        } => {
            let (graph, forest) = DiskForestStore::open(&store)?
                .load(&snapshot)?
                .with_context(|| {
                    format!("Snapshot '{}' not found in {}", snapshot, store.display())
                })?
                .restore();
            let queries = TreeQueryService::new(&graph, &forest);
            let value = match query {
                QueryKind::Trees { method } => {
                    serde_json::to_value(queries.trees_containing(&method))?
                }
                QueryKind::Paths { method } => {
                    serde_json::to_value(queries.core_paths_of(&method))?
                }
                QueryKind::Structure { tree } => serde_json::to_value(
                    queries
                        .structure_of(&tree)
                        .with_context(|| format!("Unknown tree: {}", tree))?,
                )?,
                QueryKind::Overview => serde_json::to_value(queries.forest_overview())?,
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Serve {
            port,
            store,
            snapshot,
        } => {
            let server = match store {
                Some(store_path) => {
                    let (graph, forest) = DiskForestStore::open(&store_path)?
                        .load(&snapshot)?
                        .with_context(|| format!("Snapshot '{}' not found", snapshot))?
                        .restore();
                    ForestServer::with_forest(config, graph, forest)
                }
                None => ForestServer::new(config),
            };
            server::start_server(port, server)?;
        }
    }

    Ok(())
}
