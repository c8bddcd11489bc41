//! Periodic progress log

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument, Span};

use crate::state::RunState;

/// Log the running total and the rate since the previous report every `every`
/// until `token` is cancelled.
/// The task runs inside the caller's span.
pub fn spawn_progress_reporter(
    state: Arc<RunState>,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    let task = async move {
        let mut last_at = Instant::now();
        let mut last_sent = state.packets_sent();
        let Some(first_tick) = last_at.checked_add(every) else {
            warn!("Progress interval {:?} out of range, progress reports disabled", every);
            return;
        };
        let mut ticker = interval_at(first_tick, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                now = ticker.tick() => {
                    let sent = state.packets_sent();
                    let window = now.duration_since(last_at).as_secs_f64();
                    let delta = sent.saturating_sub(last_sent);
                    let rate = if window > 0.0 { delta as f64 / window } else { 0.0 };
                    info!("Progress: {} frames sent ({:.1} fps)", sent, rate);

                    last_at = now;
                    last_sent = sent;
                }
            }
        }
    };

    tokio::spawn(task.instrument(Span::current()))
}
