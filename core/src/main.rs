/// SideChat - chat store demo CLI entry point
use sidechat_core::{cli_app, ChatStore, Config, ScriptedCompletion};
use sidechat_core::snapshot::{KeyValueStore, MemoryStore, SledStore, SnapshotStore};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn"))
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let kv: Box<dyn KeyValueStore> = if config.ephemeral {
        Box::new(MemoryStore::new())
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        Box::new(SledStore::new(&config.data_dir)?)
    };
    let snapshots = SnapshotStore::new(kv);

    let completion = Arc::new(ScriptedCompletion::default());
    let store = ChatStore::open(&config, snapshots, completion)?;
    info!("Snapshot dir: {:?} (ephemeral: {})", config.data_dir, config.ephemeral);

    cli_app::run(store).await
}
