//! Watchpost daemon: runs the correlation pipeline on the scheduler loop
//! until interrupted.
//!
//! Usage: `watchpostd [config.yaml]`. Without a config path the built-in
//! defaults apply. Set `WATCHPOST_ENV=production` for JSON logs.

use std::sync::Arc;
use tracing::{error, info};
use wp_core::{LogAlertSink, MemoryLockStore, MemoryStore, PipelineConfig};
use wp_observability::{init_logging_with_config, LoggingConfig};
use wp_pipeline::{Pipeline, Scheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = match std::env::var("WATCHPOST_ENV").as_deref() {
        Ok("production") => LoggingConfig::production(),
        _ => LoggingConfig::development(),
    };
    init_logging_with_config(logging);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading configuration");
            PipelineConfig::from_yaml_file(&path)?
        }
        None => PipelineConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(MemoryLockStore::new());
    let pipeline = Arc::new(Pipeline::new(
        config.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        Arc::new(LogAlertSink::new()),
    ));

    let scheduler = Arc::new(Scheduler::new(pipeline, locks, config.scheduler));
    let runner = scheduler.clone();
    let loop_handle = tokio::spawn(async move { runner.run().await });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    scheduler.shutdown();
    loop_handle.await?;
    Ok(())
}
