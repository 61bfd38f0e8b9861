//! Hebe chat bot host.
//!
//! # Architecture Overview
//!
//! ```text
//!   args ──┐
//!   env ───┼──▶ Distconf ──▶ AppConfig handles ──▶ bot transport / stats client
//!   file ──┘        ▲
//!     │             │ push (file watcher)     poll (refresher)
//!     └── cache ◀───┴──────────────────────────────────┘
//! ```
//!
//! Configuration is resolved once at startup and kept live afterwards: the
//! file watcher pushes edits of the JSON file, the refresher re-reads the
//! file and re-resolves every key on `RefreshInterval`, and the cache file
//! keeps the last-known-good values across restarts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use hebe_bot::config::{self, save_cache, FileReload, LoaderOptions};
use hebe_bot::distconf::{format_duration, FileWatcher, Refresher};
use hebe_bot::lifecycle::Shutdown;
use hebe_bot::observability::logging;

#[derive(Parser)]
#[command(name = "hebe-bot")]
#[command(about = "HestinGames chat bot", long_about = None)]
struct Cli {
    /// JSON config file with string values.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Prefix of environment variables holding config keys.
    #[arg(long, default_value = "HEBE_")]
    env_prefix: String,

    /// Prefix of `<prefix><Key>=<value>` overrides.
    #[arg(long, default_value = "conf.")]
    arg_prefix: String,

    /// Last-known-good cache, loaded on start and saved on shutdown.
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Reload the config file as soon as it changes.
    #[arg(short, long)]
    watch: bool,

    /// Overrides such as `conf.Debug=true`.
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("hebe_bot=info");
    let cli = Cli::parse();

    tracing::info!("HebeBot - HestinGames starting");

    let options = LoaderOptions {
        config_path: cli.config.clone(),
        env_prefix: cli.env_prefix.clone(),
        arg_prefix: cli.arg_prefix.clone(),
        args: None,
        cache_path: cli.cache_file.clone(),
    };
    let loaded = config::load(&options, logging::config_logger());
    let app = &loaded.app;

    if app.has_placeholder_token() {
        tracing::warn!("BotToken is not configured");
    }
    tracing::info!(
        api_base_url = %app.api_base_url.get(),
        refresh_interval = %format_duration(app.refresh_interval.get()),
        debug = app.debug.get(),
        file_keys = loaded.file.keys().len(),
        overrides = cli.overrides.len(),
        "Configuration loaded"
    );
    tracing::debug!(config = %loaded.distconf.snapshot(), "Resolved configuration");

    app.api_base_url
        .watch(|url| tracing::info!(api_base_url = %url, "Stats API base URL changed"));
    app.refresh_interval.watch(|interval| {
        tracing::info!(refresh_interval = %format_duration(*interval), "Refresh interval changed")
    });
    app.debug
        .watch(|enabled| tracing::info!(debug = *enabled, "Debug mode changed"));

    let _watcher = if cli.watch {
        match FileWatcher::new(&cli.config, loaded.file.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start config watcher, relying on polling");
                None
            }
        }
    } else {
        None
    };

    let reload = FileReload::new(loaded.file.clone(), cli.config.clone())
        .then_resolve(loaded.distconf.clone());
    let refresher = Arc::new(Refresher::new(app.refresh_interval.clone(), Arc::new(reload)));
    let refresh_task = refresher.clone().spawn();

    let shutdown = Shutdown::new();
    let mut signal = shutdown.subscribe();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        });
    }

    signal.wait().await;

    refresher.close();
    refresher.done().await;
    if let Err(e) = refresh_task.await {
        tracing::error!(error = %e, "Refresher task failed");
    }

    if let Some(path) = &cli.cache_file {
        if let Err(e) = save_cache(&loaded.cached, path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to save config cache");
        }
    }
    loaded.distconf.close();

    tracing::info!("Shutdown complete");
    Ok(())
}
