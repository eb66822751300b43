use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use app::{AppBuilder, Application, Core, NetworkIdentity};
use clap::Parser;
use network_shared::SERVER_CLIENT_ID;
use scene::SceneStorage;
use server::SyncServer;
use tracing::info;

struct ServerApp;

impl Application for ServerApp {
    const APP_ID: &'static str = "server";
}

/// Scene synchronisation server.
#[derive(Debug, Parser)]
#[command(name = "server", version)]
struct Args {
    /// Settings file; defaults to the server's settings.toml.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Stored scene to serve; defaults to `scene.scene_name` from the settings.
    #[arg(long)]
    scene: Option<String>,

    /// Directory holding the stored scenes.
    #[arg(long)]
    scenes_dir: Option<PathBuf>,

    /// Interface the three endpoints bind on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let context = AppBuilder::<ServerApp>::new(env!("CARGO_PKG_VERSION"))
        .map_err(|err| anyhow!(err))?
        .build();

    let settings = context
        .settings_store(args.settings.as_deref())
        .context("failed to open settings")?
        .snapshot()?;

    let scene_name = args
        .scene
        .clone()
        .unwrap_or_else(|| settings.scene.scene_name.clone());
    let storage = SceneStorage::new(
        args.scenes_dir
            .clone()
            .unwrap_or_else(|| context.path_context().scenes_dir()),
    );

    let core = Core::new(
        settings,
        NetworkIdentity {
            client_id: SERVER_CLIENT_ID,
            is_server: true,
        },
    );
    let blobs = storage
        .load(&scene_name)
        .with_context(|| format!("failed to load scene `{scene_name}` from {}", storage.dir().display()))?;
    core.scene().load_blobs(blobs)?;

    let server = SyncServer::bind_tcp(core, &args.bind).await?;
    info!(scene = %scene_name, version = context.version(), "server live, Ctrl+C stops it");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown().await;
    Ok(())
}
