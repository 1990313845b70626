use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use graphmaps_cli::commands::{places, plot, resolve, seed};
use graphmaps_cli::Workspace;
use graphmaps_lib::{Config, Coordinates, GraphId, NodeId, PlotRequest, SearchAlgorithm};

#[derive(Parser, Debug)]
#[command(author, version, about = "GraphMaps road-graph resolution and route plotting")]
struct Cli {
    /// Override the data directory (graphs, path artifacts, place index).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve two endpoints to a graph id and source/destination nodes.
    Resolve {
        /// Source as LAT,LON.
        #[arg(long = "from", allow_hyphen_values = true)]
        from: Option<Coordinates>,
        /// Destination as LAT,LON.
        #[arg(long = "to", allow_hyphen_values = true)]
        to: Option<Coordinates>,
        /// Source as a free-text address.
        #[arg(long = "from-address", conflicts_with = "from")]
        from_address: Option<String>,
        /// Destination as a free-text address.
        #[arg(long = "to-address", conflicts_with = "to")]
        to_address: Option<String>,
        /// Search algorithm echoed to the search process.
        #[arg(long, default_value = "dijkstra")]
        algorithm: SearchAlgorithm,
    },
    /// Reconstruct a finished search and render it as GeoJSON.
    Plot {
        #[arg(long)]
        graph_id: String,
        /// Key of the path/visited/active artifacts.
        #[arg(long)]
        solution_key: String,
        #[arg(long, allow_hyphen_values = true)]
        source: NodeId,
        #[arg(long, allow_hyphen_values = true)]
        destination: NodeId,
        /// Exit with an error when the predecessor chain is incomplete.
        #[arg(long)]
        require_complete: bool,
    },
    /// Pre-cache place graphs listed in a JSON city file.
    Seed {
        #[arg(long)]
        cities: PathBuf,
    },
    /// List cached places and their graph ids.
    Places,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = Config::from_env(cli.data_dir.as_deref()).context("failed to load configuration")?;
    let workspace = Workspace::open(config)?;

    match cli.command {
        Command::Resolve {
            from,
            to,
            from_address,
            to_address,
            algorithm,
        } => {
            let endpoints = resolve::Endpoints::from_args(from, to, from_address, to_address)?;
            resolve::handle_resolve(&workspace, &endpoints, algorithm)?;
        }
        Command::Plot {
            graph_id,
            solution_key,
            source,
            destination,
            require_complete,
        } => {
            let request = PlotRequest {
                graph_id: GraphId::new(graph_id),
                solution_key,
                source,
                destination,
            };
            plot::handle_plot(&workspace, &request, require_complete)?;
        }
        Command::Seed { cities } => {
            seed::handle_seed(&workspace, &cities)?;
        }
        Command::Places => {
            places::handle_places(&workspace)?;
        }
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
}
