//! Publishing server wiring.
//!
//! Connects the store, the mirror, the watch registry and the sync
//! dispatcher, then serves the editor API until Ctrl+C:
//!
//! ```text
//! ┌──────────────┐   requests    ┌───────────────┐
//! │  axum router │ ────────────▶ │ Publish Façade│──▶ store + mirror + hook
//! └──────────────┘               └───────────────┘
//! ┌──────────────┐    events     ┌───────────────┐
//! │WatchRegistry │ ────────────▶ │SyncDispatcher │──▶ store + mirror
//! │ (poll loops) │   (channel)   └───────────────┘
//! └──────────────┘
//! ```

use crate::{
    api::{self, AppState},
    config::AppConfig,
    log,
    mirror::FileMirror,
    publish::Publisher,
    store::ContentStore,
    sync::SyncDispatcher,
    watch::WatchRegistry,
};
use anyhow::{Context, Result, bail};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, sync::mpsc};

/// Watcher events buffered between scan dispatch and sync handling.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Start the publishing server.
///
/// This function:
/// 1. Opens the database and prepares the content layout
/// 2. Spawns the sync dispatcher and the configured startup watchers
/// 3. Binds the API (with auto-retry on port conflict)
/// 4. Serves until Ctrl+C
pub async fn serve(config: &'static AppConfig) -> Result<()> {
    let store = ContentStore::connect(&config.database.path).await?;
    let mirror = FileMirror::new(config.content.root.clone());
    mirror.ensure_layout()?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let registry = WatchRegistry::new(events_tx);
    let dispatcher = SyncDispatcher::new(store.clone(), mirror.clone());
    tokio::spawn(dispatcher.run(events_rx));

    let interval = Duration::from_secs(config.watch.interval_secs);
    for dir in &config.watch.dirs {
        match registry.start(dir.clone(), interval) {
            Ok(()) => log!("watch"; "watching {} every {}s", dir.display(), interval.as_secs()),
            Err(err) => log!("watch"; "skipping {}: {err}", dir.display()),
        }
    }

    let publisher = Publisher::new(store.clone(), mirror.clone(), config.deploy.hook_url.clone());
    let state = Arc::new(AppState {
        store,
        publisher,
        registry,
        default_watch_interval: interval,
    });
    let app = api::router(Arc::clone(&state), mirror.images_dir());

    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;
    let (listener, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES).await?;
    log!("serve"; "http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.registry.stop_all();
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
async fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if offset > 0 {
                    log!("serve"; "port {base_port} in use, bound {port} instead");
                }
                let addr = listener.local_addr()?;
                return Ok((listener, addr));
            }
            Err(_) if offset + 1 < max_retries => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to bind {addr}"));
            }
        }
    }

    bail!(
        "No free port in {base_port}..{}",
        base_port.saturating_add(max_retries)
    )
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        log!("serve"; "shutting down...");
    }
}
