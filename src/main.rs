use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chartmatch::embedder::{ImageEmbedder, OnnxEmbedder};
use chartmatch::{config, index, matcher, server, state::AppState};
use clap::{Parser, Subcommand};
use log::info;

#[derive(Parser)]
#[command(name = "chartmatch")]
#[command(
    version,
    about = "Match chart screenshots against a reference set and report buy/sell"
)]
struct Cli {
    /// Config file (defaults to the built-in config path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reference index and serve the HTTP API
    Serve,
    /// Match a single image and print the result as JSON
    Match {
        /// Image to match
        image: PathBuf,
    },
    /// Build the reference index and list its entries
    Index,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(cfg),
        Commands::Match { image } => match_image(&cfg, &image),
        Commands::Index => list_index(&cfg),
    }
}

fn load_embedder(cfg: &config::Config) -> Result<Arc<dyn ImageEmbedder>> {
    info!("Loading model: {}", cfg.model.path.display());
    Ok(Arc::new(OnnxEmbedder::new(&cfg.model)?))
}

fn serve(cfg: config::Config) -> Result<()> {
    let embedder = load_embedder(&cfg)?;
    let state = Arc::new(AppState::build(cfg, embedder)?);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server::serve(state))
}

fn match_image(cfg: &config::Config, image: &Path) -> Result<()> {
    let embedder = load_embedder(cfg)?;
    let index = index::build_index(&cfg.references, &cfg.image_root, embedder.as_ref())
        .context("Failed to build reference index")?;

    let result = matcher::find_best_match(image, &index, embedder.as_ref())
        .with_context(|| format!("Failed to match {}", image.display()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn list_index(cfg: &config::Config) -> Result<()> {
    let embedder = load_embedder(cfg)?;
    let index = index::build_index(&cfg.references, &cfg.image_root, embedder.as_ref())
        .context("Failed to build reference index")?;

    for entry in index.entries() {
        info!("{:40} {}", entry.label, entry.decision);
    }
    info!(
        "✓ {} reference(s), embedding dimension {}",
        index.len(),
        index.dimension()
    );
    Ok(())
}
