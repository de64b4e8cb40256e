// Package shutdown provides graceful shutdown functionality.

use anyhow::Result;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Graceful shutdown handler.
///
/// Waits for SIGINT or the shared token, cancels the token so that every
/// listener stops, then drains the registered finalizers within a timeout.
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Duration,
    finalizers: Vec<(&'static str, BoxFuture<'static, ()>)>,
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            timeout: Duration::from_secs(10),
            finalizers: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queues work to run after cancellation, in insertion order.
    pub fn on_shutdown(&mut self, name: &'static str, fut: BoxFuture<'static, ()>) {
        self.finalizers.push((name, fut));
    }

    /// Waits for shutdown signal and then for all finalizers to complete.
    pub async fn await_shutdown(self) -> Result<()> {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
        }

        self.cancel_and_await_with_timeout().await
    }

    async fn cancel_and_await_with_timeout(self) -> Result<()> {
        self.shutdown_token.cancel();

        let timeout_duration = self.timeout;
        let drain = async move {
            for (name, fut) in self.finalizers {
                fut.await;
                info!(component = "graceful-shutdown", event = "finalizer_done", finalizer = name);
            }
        };

        match timeout(timeout_duration, drain).await {
            Ok(()) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout = ?timeout_duration,
                    "not all finalizers completed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_finalizers_run_after_cancel() {
        let token = CancellationToken::new();
        let ran = Arc::new(AtomicBool::new(false));
        let mut graceful = GracefulShutdown::new(token.clone());
        let flag = ran.clone();
        let observed = token.clone();
        graceful.on_shutdown(
            "flag",
            async move {
                assert!(observed.is_cancelled());
                flag.store(true, Ordering::SeqCst);
            }
            .boxed(),
        );

        token.cancel();
        graceful.await_shutdown().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_finalizer_times_out() {
        let token = CancellationToken::new();
        let mut graceful = GracefulShutdown::new(token.clone()).with_timeout(Duration::from_millis(50));
        graceful.on_shutdown("slow", tokio::time::sleep(Duration::from_secs(5)).boxed());

        token.cancel();
        let err = graceful.await_shutdown().await.unwrap_err();
        assert!(err.downcast_ref::<TimeoutError>().is_some());
    }
}
