use price_holder::metrics;
use price_holder::DelayingPriceProcessor;
use price_holder::LifecycleError;
use price_holder::Price;
use price_holder::PriceHolder;
use price_holder::PriceHolderConfig;
use price_holder::Result;
use rand::Rng;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let settings = PriceHolderConfig::new()?.validate()?;

    init_observability();
    info!(?settings, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    // Cuts short artificial processing delays once shutdown starts
    let processing_cancel = CancellationToken::new();
    let holder = PriceHolder::new(
        DelayingPriceProcessor::new(settings.demo.process_delay()).with_cancellation(processing_cancel.clone()),
        settings.processing.clone(),
    );
    holder.start()?;

    if settings.monitoring.enabled {
        tokio::spawn(metrics::start_server(settings.monitoring.metrics_port, graceful_rx.clone()));
    }

    let producer = spawn_producer(holder.clone(), &settings, graceful_rx.clone());
    let reporter = spawn_reporter(holder.clone(), &settings, graceful_rx.clone());

    info!("Application started. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    for task in [producer, reporter] {
        if let Err(e) = task.await {
            warn!("demo task ended abnormally: {:?}", e);
        }
    }

    processing_cancel.cancel();
    if let Err(e) = holder.stop().await {
        error!("holder stops: {:?}", e);
    }

    println!("Exiting program.");
    Ok(())
}

/// Put a random price to a random key on every tick.
fn spawn_producer(
    holder: PriceHolder,
    settings: &PriceHolderConfig,
    mut shutdown: watch::Receiver<()>,
) -> JoinHandle<()> {
    let entity_count = settings.demo.entity_count;
    let max_price = settings.demo.max_price;
    let mut ticker = tokio::time::interval(settings.demo.put_interval());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let (key, value) = {
                        let mut rng = rand::thread_rng();
                        (rng.gen_range(0..entity_count), rng.gen_range(0..max_price))
                    };
                    if let Err(e) = holder.put(&key.to_string(), Price::from(value)) {
                        warn!(key, "put failed: {:?}", e);
                    }
                }
            }
        }
    })
}

/// Print the current price of a random key on every tick.
fn spawn_reporter(
    holder: PriceHolder,
    settings: &PriceHolderConfig,
    mut shutdown: watch::Receiver<()>,
) -> JoinHandle<()> {
    let entity_count = settings.demo.entity_count;
    let mut ticker = tokio::time::interval(settings.demo.get_interval());
    let reader = holder.reader();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let key = rand::thread_rng().gen_range(0..entity_count).to_string();
                    match reader.get(&key) {
                        Ok(Some(price)) => println!("Entity: {key}, price: {price}"),
                        Ok(None) => {}
                        // Producer has not reached this key yet
                        Err(e) if e.is_not_found() => {}
                        Err(e) => warn!(%key, "get failed: {:?}", e),
                    }
                    debug!(entities = holder.entity_count(), queued = holder.queue_len(), "holder status");
                }
            }
        }
    })
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| LifecycleError::SignalInstallFailed(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| LifecycleError::SignalInstallFailed(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        LifecycleError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();
}
