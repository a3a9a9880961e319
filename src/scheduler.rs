//! Run scheduling: a single run, or one run per interval until shutdown.
use crate::processor::{ProcessError, ProcessStats, Processor};
use crate::source::EntrySource;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Run the processor once and log the outcome.
///
/// A fetch failure is logged together with the partial statistics and then
/// returned to the caller.
pub async fn run_once<S: EntrySource>(
    processor: &Processor<S>,
) -> Result<ProcessStats, ProcessError> {
    let result = processor.process().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Processing error");
        tracing::info!("Partial run: {}", e.stats());
    }
    result
}

/// Run immediately, then every `interval`, until `shutdown` resolves.
///
/// Runs never overlap: a run that outlasts the interval delays the next tick
/// instead of queueing extra runs. A failed run does not stop the loop.
/// Returns the number of runs started.
pub async fn run_every<S, F>(processor: &Processor<S>, interval: Duration, shutdown: F) -> usize
where
    S: EntrySource,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut runs = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(runs = runs, "Shutting down");
                break;
            }
            _ = ticker.tick() => {
                runs += 1;
                tracing::info!(run = runs, "Starting processing run");
                // Errors are already logged; the next tick retries
                let _ = run_once(processor).await;
            }
        }
    }

    runs
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
