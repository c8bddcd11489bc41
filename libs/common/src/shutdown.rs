//! Graceful shutdown utilities
//!
//! Turns Ctrl+C / SIGTERM into a cooperative stop request on a `CancellationToken`.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Which signal ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Wait for Ctrl+C, or SIGTERM on Unix
pub async fn wait_for_shutdown() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler: {}. Only Ctrl+C will stop the run", e);
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = async {
                match term_signal.as_mut() {
                    Some(sig) => { sig.recv().await; },
                    None => std::future::pending::<()>().await,
                }
            } => ShutdownSignal::Terminate,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        ShutdownSignal::Interrupt
    }
}

/// Cancel `token` when a shutdown signal arrives
///
/// The watcher exits on its own once `token` is cancelled by anyone else.
pub fn cancel_on_shutdown(token: CancellationToken) -> JoinHandle<Option<ShutdownSignal>> {
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_shutdown() => {
                warn!("{:?} received, stopping traffic generation", signal);
                token.cancel();
                Some(signal)
            }
            () = token.cancelled() => None,
        }
    })
}
