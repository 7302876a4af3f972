use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref PRICE_PUTS_TOTAL: IntCounter =
        IntCounter::new("price_puts_total", "Prices submitted through put")
            .expect("metric can not be created");

    pub static ref PRICE_COALESCED_TOTAL: IntCounter = IntCounter::new(
        "price_coalesced_total",
        "Prices folded into an entity that was already scheduled"
    )
    .expect("metric can not be created");

    pub static ref TRANSFORM_INVOCATIONS_TOTAL: IntCounter = IntCounter::new(
        "transform_invocations_total",
        "Processor invocations made by the worker pool"
    )
    .expect("metric can not be created");

    pub static ref TRANSFORM_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "transform_failures_total",
        "Processor invocations that failed or panicked"
    )
    .expect("metric can not be created");

    pub static ref ENTITY_REQUEUES_TOTAL: IntCounter = IntCounter::new(
        "entity_requeues_total",
        "Entities pushed back onto the work queue after processing"
    )
    .expect("metric can not be created");

    pub static ref REGISTERED_ENTITIES: IntGauge =
        IntGauge::new("registered_entities", "Keys known to the registry")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_DEFAULT: Once = Once::new();

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(PRICE_PUTS_TOTAL.clone()),
        Box::new(PRICE_COALESCED_TOTAL.clone()),
        Box::new(TRANSFORM_INVOCATIONS_TOTAL.clone()),
        Box::new(TRANSFORM_FAILURES_TOTAL.clone()),
        Box::new(ENTITY_REQUEUES_TOTAL.clone()),
        Box::new(REGISTERED_ENTITIES.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Render every custom metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    REGISTER_DEFAULT.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

/// Serve `/metrics` until the shutdown signal fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!(port, "metrics server listening");
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    Ok(gather_metrics())
}
