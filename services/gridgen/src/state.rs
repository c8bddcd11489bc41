//! Run-scoped shared state

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Counter and stop flag shared by every loop of one generation run
///
/// `packets_sent` only grows, by exactly one per delivered frame. The stop flag is
/// cooperative: loops poll it once per iteration and pacing sleeps wake on it.
#[derive(Debug, Default)]
pub struct RunState {
    packets_sent: AtomicU64,
    stop: CancellationToken,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State whose stop flag is driven by an existing token
    pub fn with_token(stop: CancellationToken) -> Self {
        Self {
            packets_sent: AtomicU64::new(0),
            stop,
        }
    }

    /// Frames delivered so far
    #[inline]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    /// Count one delivered frame, returning the new total
    #[inline]
    pub fn record_sent(&self) -> u64 {
        self.packets_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }
}
