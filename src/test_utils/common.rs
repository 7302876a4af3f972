use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::Price;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub fn price(value: i64) -> Price {
    Decimal::from(value)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(
    timeout: Duration,
    condition: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Await `fut`, panicking if it does not complete within `timeout`.
pub async fn within<F>(
    timeout: Duration,
    fut: F,
) -> F::Output
where
    F: Future,
{
    tokio::time::timeout(timeout, fut).await.expect("operation timed out")
}
