mod app;
mod config;
mod graph;
mod util;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph snapshot to start from.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Directory watched for incoming batch files.
    #[arg(long)]
    batch_dir: Option<PathBuf>,

    #[arg(long, default_value = "graph-snapshot.json")]
    save_path: PathBuf,

    /// JSON file with layout, render, camera and feed tuning.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %format!("{err:#}"), "falling back to default tuning");
            Config::default()
        }
    };

    info!(
        snapshot = ?args.snapshot,
        batch_dir = ?args.batch_dir,
        save_path = %args.save_path.display(),
        "starting ontograph"
    );

    let launch = app::LaunchOptions {
        snapshot: args.snapshot,
        batch_dir: args.batch_dir,
        save_path: args.save_path,
        config,
    };
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ontograph",
        options,
        Box::new(move |cc| Ok(Box::new(app::GraphApp::new(cc, launch)))),
    )
}
