//! Command-line driver for catalog synchronization runs.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use catalog_sync::{
    Origin, SnapshotCatalog, SnapshotStore, SyncEngine, TransformConfig, TransformerRegistry,
};

#[derive(Parser)]
#[command(
    name = "catalog-sync",
    about = "Synchronize user-authored state between two open-data catalog instances",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-kind deltas from cached snapshots and write payload files
    Sync {
        /// Transformation config (JSON, keyed by entity kind)
        #[arg(long)]
        config: PathBuf,
        /// Directory holding <origin>_<kind>.json snapshot files
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
        /// Directory the <kind>_delta.json payload files are written to
        #[arg(long, default_value = "deltas")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            config,
            snapshot_dir,
            out,
        } => run_sync(config, snapshot_dir, out),
    }
}

fn run_sync(config_path: PathBuf, snapshot_dir: Option<PathBuf>, out: PathBuf) -> Result<()> {
    let config = TransformConfig::from_path(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let registry = TransformerRegistry::standard();

    let dir = snapshot_dir.unwrap_or_else(SnapshotStore::default_dir);
    let store = SnapshotStore::new(dir.clone())
        .with_context(|| format!("cannot open snapshot directory {}", dir.display()))?;
    let src = SnapshotCatalog::new(store.clone(), Origin::Src);
    let dest = SnapshotCatalog::new(store, Origin::Dest);

    let engine = SyncEngine::new(&config, &registry, &src, &dest)?;
    let report = engine.run();

    fs::create_dir_all(&out)
        .with_context(|| format!("cannot create output directory {}", out.display()))?;
    for (kind, delta) in &report.deltas {
        let path = out.join(format!("{kind}_delta.json"));
        let body = serde_json::to_string_pretty(delta)?;
        fs::write(&path, body).with_context(|| format!("cannot write {}", path.display()))?;
        println!(
            "{} {kind}: {} adds, {} deletes, {} updates -> {}",
            "done".green().bold(),
            delta.adds.len(),
            delta.deletes.len(),
            delta.updates.len(),
            path.display()
        );
    }
    if let Some((kind, err)) = &report.failure {
        anyhow::bail!("sync stopped at {kind}: {err}");
    }
    Ok(())
}
