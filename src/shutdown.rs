use futures::future;
use tokio::select;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{info, warn};

/// Cooperative cancellation signal, fed by SIGINT/SIGTERM in the binary.
pub struct Shutdown {
    rx: watch::Receiver<Option<&'static str>>,
}

impl Shutdown {
    /// Listens for process signals.
    pub fn new() -> Self {
        Self {
            rx: spawn_shutdown_listener(),
        }
    }

    /// Manually triggered shutdown; send `Some(reason)` to request it.
    pub fn channel() -> (watch::Sender<Option<&'static str>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    pub fn requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<&'static str> {
        *self.rx.borrow()
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` when the sleep was cut short by a shutdown request.
    pub async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        if self.requested() {
            return true;
        }

        let sleep = time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            select! {
                _ = &mut sleep => return false,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        // Sender is gone, nobody can request a shutdown anymore.
                        (&mut sleep).await;
                        return false;
                    }
                    if self.requested() {
                        return true;
                    }
                }
            }
        }
    }

    /// Drives `future` to completion unless shutdown is requested first.
    ///
    /// Returns `None` when the shutdown request won; `future` is dropped then.
    pub async fn run_or_shutdown<F>(&mut self, future: F) -> Option<F::Output>
    where
        F: std::future::Future,
    {
        if self.requested() {
            return None;
        }

        tokio::pin!(future);

        loop {
            select! {
                res = &mut future => return Some(res),
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return Some(future.await);
                    }
                    if self.requested() {
                        return None;
                    }
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_shutdown_listener() -> watch::Receiver<Option<&'static str>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(None);

    tokio::spawn(async move {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).ok();

        let term_future = async {
            if let Some(ref mut sigterm) = sigterm {
                sigterm.recv().await;
                Some("SIGTERM")
            } else {
                future::pending::<Option<&'static str>>().await
            }
        };

        select! {
            res = signal::ctrl_c() => {
                if res.is_ok() {
                    info!("Received SIGINT.");
                    let _ = shutdown_tx.send(Some("SIGINT"));
                } else {
                    warn!("Failed to listen for SIGINT: {:?}", res.err());
                }
            }
            _ = term_future => {
                info!("Received SIGTERM.");
                let _ = shutdown_tx.send(Some("SIGTERM"));
            }
        }

        // Keep the sender alive so receivers observe the final value.
        future::pending::<()>().await;
    });

    shutdown_rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_request() {
        let (_tx, mut shutdown) = Shutdown::channel();
        let start = time::Instant::now();

        assert!(!shutdown.sleep_or_shutdown(Duration::from_secs(5)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_request() {
        let (tx, mut shutdown) = Shutdown::channel();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(Some("SIGTERM"));
        });
        let start = time::Instant::now();

        assert!(shutdown.sleep_or_shutdown(Duration::from_secs(60)).await);
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(shutdown.reason(), Some("SIGTERM"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_survives_dropped_sender() {
        let (tx, mut shutdown) = Shutdown::channel();
        drop(tx);
        let start = time::Instant::now();

        assert!(!shutdown.sleep_or_shutdown(Duration::from_secs(3)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_without_request() {
        let (_tx, mut shutdown) = Shutdown::channel();

        let res = shutdown
            .run_or_shutdown(async {
                time::sleep(Duration::from_secs(2)).await;
                7
            })
            .await;

        assert_eq!(res, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_abandoned_on_request() {
        let (tx, mut shutdown) = Shutdown::channel();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(Some("SIGINT"));
        });
        let start = time::Instant::now();

        let res = shutdown
            .run_or_shutdown(time::sleep(Duration::from_secs(30)))
            .await;

        assert_eq!(res, None);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_skipped_when_already_requested() {
        let (tx, mut shutdown) = Shutdown::channel();
        tx.send(Some("SIGTERM")).unwrap();

        let res = shutdown.run_or_shutdown(async { 1 }).await;

        assert_eq!(res, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_dropped_sender() {
        let (tx, mut shutdown) = Shutdown::channel();
        drop(tx);

        let res = shutdown
            .run_or_shutdown(async {
                time::sleep(Duration::from_secs(3)).await;
                "done"
            })
            .await;

        assert_eq!(res, Some("done"));
    }
}
