use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout_at;
use tokio::time::Instant;
use tracing::error;
use tracing::warn;

use crate::Result;

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

/// Wait for every handle until a shared deadline.
///
/// Returns how many tasks were still running when the deadline passed.
/// Those tasks are detached, not aborted.
pub(crate) async fn join_with_deadline(
    handles: Vec<JoinHandle<()>>,
    duration: Duration,
) -> usize {
    let deadline = Instant::now() + duration;
    let mut pending = 0;

    for handle in handles {
        match timeout_at(deadline, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("task terminated abnormally: {:?}", e);
            }
            Err(_) => {
                pending += 1;
            }
        }
    }

    pending
}
