//! Thin demo binary: wires a `Config` into an `Orchestrator` and serves a
//! handful of path lookups from the command line. The full HTTP front-end
//! and CLI diagnostic tool are external collaborators, not this crate.

use clap::{Parser, Subcommand};
use grfserve::{mime_from_extension, Config, Orchestrator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grfserve", version, about = "GRF asset server core — demo CLI")]
struct Cli {
    /// Directory containing the local overlay and archives named in the manifest
    #[arg(short, long, default_value = ".")]
    resource_path: PathBuf,
    /// INI data manifest listing archives in overlay order
    #[arg(short, long)]
    data_manifest: Option<PathBuf>,
    /// Disable the in-memory LRU cache
    #[arg(long)]
    no_cache: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one asset and print its size and MIME hint
    Get { path: String },
    /// Search indexed and local-overlay paths by regex
    Search { pattern: String },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = Config {
        resource_path: cli.resource_path,
        data_manifest: cli.data_manifest,
        cache_enabled: !cli.no_cache,
        ..Config::default()
    };

    let orchestrator = match Orchestrator::build(config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("failed to start: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Get { path } => match orchestrator.get_asset(&path) {
            Some(bytes) => println!("{} bytes, mime={}", bytes.len(), mime_from_extension(&path)),
            None => {
                eprintln!("not found: {path}");
                std::process::exit(1);
            }
        },
        Commands::Search { pattern } => match orchestrator.search(&pattern) {
            Ok(paths) => {
                for p in paths {
                    println!("{p}");
                }
            }
            Err(e) => {
                eprintln!("bad search pattern: {e}");
                std::process::exit(1);
            }
        },
    }
}
