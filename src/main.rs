//! fasp-bridge - signed-protocol bridge to Fediverse Auxiliary Service Providers

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fasp_bridge::{
    backfill::InMemoryDataset,
    config::Args,
    provider::ProviderRegistry,
    store::{BackfillStore, ProviderStore, SubscriptionStore},
    worker::{spawn_worker, JobQueue, WorkerContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fasp_bridge={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  fasp-bridge - FASP protocol bridge");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Build: {} ({})", env!("GIT_COMMIT_SHORT"), env!("BUILD_TIMESTAMP"));
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("Job queue size: {}", args.job_queue_size);
    info!("Backfill page size: {}", args.backfill_max_count);
    info!("======================================");

    let providers = Arc::new(ProviderStore::new());
    let backfills = Arc::new(BackfillStore::new());
    let subscriptions = Arc::new(SubscriptionStore::new());
    let dataset = Arc::new(InMemoryDataset::new());

    let (queue, rx) = JobQueue::new(args.job_queue_size);
    let registry = Arc::new(ProviderRegistry::new(
        Arc::clone(&providers),
        Arc::clone(&backfills),
        Arc::clone(&subscriptions),
        queue.clone(),
        args.client_config(),
        args.backfill_max_count,
    ));

    let worker = spawn_worker(
        WorkerContext {
            registry: Arc::clone(&registry),
            providers,
            backfills,
            source: dataset,
            client_config: args.client_config(),
            queue,
        },
        rx,
    );

    info!("Bridge ready; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    worker.abort();

    Ok(())
}
