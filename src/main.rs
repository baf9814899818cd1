use std::sync::Arc;

use devgate::metrics::gather_metrics;
use devgate::AdmissionController;
use devgate::ChangeHandler;
use devgate::ChangeWatcher;
use devgate::DevGateConfig;
use devgate::Error;
use devgate::ImpactLevel;
use devgate::ProjectChangeEvent;
use devgate::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = DevGateConfig::new()?.validate()?;
    debug!(?config, "configuration loaded");

    let admission = AdmissionController::system(config.admission.clone());
    info!(
        capacity = admission.capacity(),
        apple_silicon = admission.profile().is_apple_silicon_class,
        high_memory_variant = admission.profile().is_high_memory_variant,
        "host profiled"
    );

    let watcher = ChangeWatcher::new(config.watcher.clone(), &config.classifier)?;
    let report = watcher.start(&config.watcher.project_root, config.watcher.recursive, log_change())?;
    for failure in &report.failures {
        warn!("not watching {}: {}", failure.path.display(), failure.error);
    }

    info!(root = %report.root.display(), "watching project. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown().await {
        error!("Failed to wait for shutdown signal: {:?}", e);
    }

    watcher.stop_all();
    admission.close();
    debug!(stats = ?watcher.stats(), admission = ?admission.stats(), "final stats");
    debug!("metrics:\n{}", gather_metrics());

    info!("Shutdown completed");
    Ok(())
}

fn log_change() -> ChangeHandler {
    Arc::new(|change: ProjectChangeEvent| {
        let actions: Vec<&str> = change.recommendations.iter().map(|a| a.as_str()).collect();
        if change.impact >= ImpactLevel::High {
            warn!(
                path = %change.event.path.display(),
                kind = ?change.event.kind,
                category = %change.category,
                impact = %change.impact,
                ?actions,
                "project change"
            );
        } else if change.impact > ImpactLevel::None {
            info!(
                path = %change.event.path.display(),
                kind = ?change.event.kind,
                category = %change.category,
                impact = %change.impact,
                ?actions,
                "project change"
            );
        }
    })
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("SIGINT handler: {e}")))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
