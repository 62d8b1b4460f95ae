use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use clap::Parser;
use log::{LevelFilter, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

mod animator;
mod config;
mod display;
mod messages;
mod render;
mod scanner;

/// Scan for nearby Bluetooth devices advertising known skimmer module names.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::AppConfig::load(&args.config)?;
    init_logging(config.log_file.as_deref())?;

    if let Err(err) = run(config).await {
        error!("fatal: {err:#}");
        return Err(err);
    }
    Ok(())
}

async fn run(config: config::AppConfig) -> Result<()> {
    let oled = display::Oled::open(&config.display)?;

    let bt_manager = Manager::new().await?;

    // get the first bluetooth adapter
    let adapters = bt_manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .context("no Bluetooth adapter found")?;

    info!(
        "Watching for {} known skimmer names",
        config.scan.skimmer_names.len()
    );

    let (render_tx, render_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let renderer = render::Renderer::new(oled, render_rx, config.scan.skimmer_alert_duration());
    let scanner = scanner::Scanner::new(
        scanner::BtleplugRadio::new(central),
        config.scan.clone(),
        render_tx.clone(),
    );
    let animator = animator::Animator::new(render_tx);

    let mut tasks = JoinSet::new();
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { renderer.run(cancel).await.context("renderer loop failed") });
    }
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { scanner.run(cancel).await.context("scanner loop failed") });
    }
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { animator.run(cancel).await.context("animator loop failed") });
    }

    // The loops are infinite, so the first one to come back has faulted.
    // Stop the siblings instead of leaving them running orphaned.
    let mut failure = None;
    if let Some(result) = tasks.join_next().await {
        cancel.cancel();
        failure = flatten(result).err();
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = flatten(result) {
            error!("while shutting down: {err:#}");
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn flatten(result: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    result.context("task panicked")?
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            env_logger::Builder::new()
                .filter_level(LevelFilter::Info)
                .parse_default_env()
                .format(|buf, record| {
                    writeln!(buf, "{} {}: {}", buf.timestamp(), record.level(), record.args())
                })
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        None => {
            pretty_env_logger::formatted_builder()
                .filter_level(LevelFilter::Info)
                .parse_default_env()
                .init();
        }
    }
    Ok(())
}
