//! Ctrl-C handling
//!
//! The first interrupt cancels the run so active setups are torn down. A
//! second one means the user gave up waiting for teardown.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// What ended [`watch_interrupts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupts {
    /// A second interrupt arrived after cancellation
    ForceExit,
    /// The interrupt source failed; nothing more will arrive
    Closed,
}

/// Cancel `token` on the first interrupt and return on the second.
///
/// `next_interrupt` resolves to `true` for each interrupt received and to
/// `false` if the source fails.
pub async fn watch_interrupts<F, Fut>(token: CancellationToken, mut next_interrupt: F) -> Interrupts
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !next_interrupt().await {
        return Interrupts::Closed;
    }
    warn!("Interrupted, cancelling and tearing down active setups (Ctrl-C again to exit now)");
    token.cancel();

    if !next_interrupt().await {
        return Interrupts::Closed;
    }
    warn!("Interrupted again, exiting without waiting for teardown");
    Interrupts::ForceExit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Interrupt = Pin<Box<dyn Future<Output = bool> + Send>>;

    /// Each `notify_one` delivers one interrupt
    fn source(notify: &Arc<Notify>) -> impl FnMut() -> Interrupt + Send + 'static {
        let notify = notify.clone();
        move || -> Interrupt {
            let notify = notify.clone();
            Box::pin(async move {
                notify.notified().await;
                true
            })
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_forces_exit() {
        let notify = Arc::new(Notify::new());
        let token = CancellationToken::new();
        let watcher = tokio::spawn(watch_interrupts(token.clone(), source(&notify)));

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        assert!(!watcher.is_finished());

        notify.notify_one();
        let ended = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ended, Interrupts::ForceExit);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_cancel() {
        let token = CancellationToken::new();
        let ended = watch_interrupts(token.clone(), || async { false }).await;
        assert_eq!(ended, Interrupts::Closed);
        assert!(!token.is_cancelled());
    }
}
