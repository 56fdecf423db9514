mod audio;
mod commands;
mod config;
mod controller;
mod logging;
mod model;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use audio::{LocalResolver, RodioEngine, TransportController};
use commands::{Command, HELP, Session};
use config::Settings;
use controller::PlayerController;
use model::{Downloads, Favorites, FileStore, HttpCatalog, KeyValueStore, MemoryStore, QueueStore};

/// Terminal music player for a streaming song catalog
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (settings, config_path) = match args.config {
        Some(path) => (Settings::load_from(Some(&path)), Some(path)),
        None => (Settings::load(), config::resolve_config_path()),
    };
    let settings = settings.context("loading settings")?;
    settings.validate().map_err(|e| anyhow!("invalid settings: {e}"))?;

    if let Err(e) = logging::init_logging(&settings.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!(config = ?config_path, "=== Tempo Starting ===");

    let catalog = HttpCatalog::new(
        settings.catalog.base_url.clone(),
        Duration::from_secs(settings.catalog.timeout_secs),
    )?;
    let http = catalog.http_client();

    let store: Arc<dyn KeyValueStore> = match tokio::fs::create_dir_all(&settings.storage.data_dir).await {
        Ok(()) => {
            let file_store = FileStore::new(&settings.storage.data_dir);
            tracing::debug!(root = %file_store.root().display(), "Storage ready");
            Arc::new(file_store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Data directory unavailable, favorites will not persist");
            Arc::new(MemoryStore::new())
        }
    };
    let favorites = Favorites::new(store.clone());
    let downloads = Downloads::new(settings.storage.downloads_dir(), store, http.clone());

    if let Err(e) = favorites.load().await {
        tracing::warn!(error = %e, "Could not load favorites");
    }
    if let Err(e) = downloads.load().await {
        tracing::warn!(error = %e, "Could not load download index");
    }

    let engine = Arc::new(RodioEngine::new(
        http,
        Duration::from_millis(settings.playback.status_interval_ms),
    ));
    let resolver: Arc<dyn LocalResolver> = Arc::new(downloads.clone());
    let transport = Arc::new(TransportController::new(engine.clone(), Some(resolver)));

    let mut queue = QueueStore::new();
    queue.set_repeat(settings.playback.repeat);

    let controller = PlayerController::new(
        Arc::new(Mutex::new(queue)),
        transport,
        favorites,
        downloads,
        Arc::new(catalog),
    )
    .with_seek_step(settings.playback.seek_step_secs)
    .with_page_limit(settings.catalog.page_limit);

    controller.try_start_event_listener().await;

    let res = run_app(controller.clone()).await;

    controller.stop().await;
    engine.shutdown();

    if let Err(err) = &res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("Tempo shutting down");
    res
}

async fn run_app(controller: PlayerController) -> Result<()> {
    let mut session = Session::new(controller);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("{HELP}");

    loop {
        stdout.write_all(b"tempo> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Ok(command) => {
                if !session.run(command).await {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }

    Ok(())
}
