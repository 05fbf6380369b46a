//! Shotkit CLI: inspect, assemble, export, and tag shots.
//!
//! Usage:
//!   shotkit include <DIR> <FILE>         Print a JSON file with includes expanded
//!   shotkit inspect <SHOTFILE>           Show a shot's versions, files and overrides
//!   shotkit validate <SHOTFILE>          Check a shot against the version policy
//!   shotkit assemble <SHOTFILE>          Load a shot into an in-memory scene
//!   shotkit stage <SHOTFILE> <FILES>...  Write a shot file from asset files
//!   shotkit export <SCENE> <OUTPUT>      Export tagged roots to a cache or proxy
//!   shotkit tags <SCENE>                 List the tags of a dumped scene
//!   shotkit catalogue <TRACKER>          Refresh and list catalogue entries

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shotkit_common::ProjectConfig;
use shotkit_project_model::EntryKind;

mod commands;

#[derive(Parser)]
#[command(
    name = "shotkit",
    about = "Shot assembly and cache exchange for animation pipelines",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project configuration file (defaults to $SHOTKIT_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root that shot-relative paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a JSON file with include expressions expanded
    Include {
        /// Directory the file is looked up in
        dir: PathBuf,

        /// File name, or an existing path
        file: PathBuf,
    },

    /// Show a shot's versions, root, files and overrides
    Inspect {
        /// Path to the shot file
        shot: PathBuf,
    },

    /// Check a shot file against the configured version policy
    Validate {
        /// Path to the shot file
        shot: PathBuf,
    },

    /// Assemble a shot into an in-memory scene
    Assemble {
        /// Path to the shot file
        shot: PathBuf,

        /// Tracker document used to refresh the catalogue first
        #[arg(long)]
        catalogue: Option<PathBuf>,

        /// Scene to load into instead of an empty one
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Write the resulting scene here
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Print the load summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a shot file referencing the given asset files
    Stage {
        /// Shot file to write, relative to the project root
        shot: PathBuf,

        /// Asset files to reference, as FILE or FILE=RECORD.json
        #[arg(required = true)]
        files: Vec<String>,

        /// Root shot this one inherits from
        #[arg(long)]
        inherit: Option<PathBuf>,

        /// `NAME=FILE` overrides whose record lives in FILE
        #[arg(long = "override")]
        overrides: Vec<String>,
    },

    /// Export roots of a dumped scene to a point cache or render proxy
    Export {
        /// Scene JSON written by `assemble --dump`
        scene: PathBuf,

        /// Destination file; its extension selects the handler
        output: PathBuf,

        /// Root node names (defaults to every tagged root)
        #[arg(long = "node")]
        nodes: Vec<String>,

        /// Export a render proxy instead of a point cache
        #[arg(long)]
        proxy: bool,

        #[arg(long, default_value = "1")]
        start: f64,

        #[arg(long, default_value = "1")]
        end: f64,

        #[arg(long, default_value = "1")]
        step: f64,
    },

    /// List the tags of a dumped scene
    Tags {
        /// Scene JSON written by `assemble --dump`
        scene: PathBuf,

        /// Only tags carrying every listed type flag
        #[arg(long = "type")]
        types: Vec<String>,

        /// Print the tags as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh the catalogue from a tracker document and list entries
    Catalogue {
        /// Tracker document (JSON)
        tracker: PathBuf,

        /// Only entries of this kind: asset, shot or sequence
        #[arg(long)]
        kind: Option<EntryKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::discover(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    shotkit_common::logging::init_logging(&config.logging);

    let ctx = commands::Context::new(config, cli.root);

    match cli.command {
        Commands::Include { dir, file } => commands::include::run(dir, file),
        Commands::Inspect { shot } => commands::inspect::run(&ctx, shot),
        Commands::Validate { shot } => commands::validate::run(&ctx, shot),
        Commands::Assemble {
            shot,
            catalogue,
            scene,
            dump,
            json,
        } => commands::assemble::run(&ctx, shot, catalogue, scene, dump, json).await,
        Commands::Stage {
            shot,
            files,
            inherit,
            overrides,
        } => commands::stage::run(&ctx, shot, files, inherit, overrides),
        Commands::Export {
            scene,
            output,
            nodes,
            proxy,
            start,
            end,
            step,
        } => commands::export::run(&ctx, scene, output, nodes, proxy, start, end, step),
        Commands::Tags { scene, types, json } => commands::tags::run(&ctx, scene, types, json),
        Commands::Catalogue { tracker, kind } => {
            commands::catalogue::run(&ctx, tracker, kind).await
        }
    }
}
