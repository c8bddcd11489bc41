//! Traffic profile engine
//!
//! Every profile is a sequential loop: build a frame, hand it to the sink, count it
//! if delivered, pace, repeat until the deadline, the count or a stop request.
//! `mixed` runs several loops as tasks in a `JoinSet` and joins them all before
//! reporting.

use std::sync::Arc;
use std::time::Duration;

use gridgen_protocols::{Delivery, Frame, FrameSink, Target};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::generators::{FloodFrames, MalformedFrames, NormalFrames, ScanTargets, WriteFrames};
use crate::profile::{
    pacing_interval, FloodSpec, MalformedSpec, MixedSpec, MixedVector, NormalSpec, ProfileSpec,
    ScanSpec, WriteSpec,
};
use crate::state::RunState;

/// Runs profiles against the target behind a `FrameSink`
pub struct TrafficEngine<S> {
    sink: Arc<S>,
    seed: Option<u64>,
}

impl<S> Clone for TrafficEngine<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            seed: self.seed,
        }
    }
}

impl<S: FrameSink + 'static> TrafficEngine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            seed: None,
        }
    }

    /// Seed every loop's RNG; `None` uses entropy
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn target(&self) -> &Target {
        self.sink.target()
    }

    /// Send one frame and count it on the run state if it was delivered
    pub async fn transmit(&self, frame: &Frame, port: Option<u16>, state: &RunState) -> Delivery {
        let outcome = self.sink.transmit(frame, port).await;
        if outcome.is_sent() {
            state.record_sent();
        }
        outcome
    }

    /// Run `spec` to completion (or until stopped), returning frames delivered by it
    pub async fn run_profile(&self, spec: &ProfileSpec, state: &Arc<RunState>) -> u64 {
        info!("Profile {} started -> {}", spec.name(), self.target());
        let started = Instant::now();

        let sent = match spec {
            ProfileSpec::Mixed(mixed) => self.run_mixed(mixed, state).await,
            single => self.run_single(single, state, 0).await,
        };

        info!(
            "Profile {} {}: {} frames sent in {:.1}s",
            spec.name(),
            if state.stop_requested() { "stopped" } else { "finished" },
            sent,
            started.elapsed().as_secs_f64()
        );
        sent
    }

    pub async fn run_normal(&self, spec: &NormalSpec, state: &RunState) -> u64 {
        self.normal_loop(spec, state, self.rng(0)).await
    }

    pub async fn run_flood(&self, spec: &FloodSpec, state: &RunState) -> u64 {
        self.flood_loop(spec, state).await
    }

    pub async fn run_scan(&self, spec: &ScanSpec, state: &RunState) -> u64 {
        self.scan_loop(spec, state).await
    }

    pub async fn run_unauthorized_write(&self, spec: &WriteSpec, state: &RunState) -> u64 {
        self.write_loop(spec, state, self.rng(0)).await
    }

    pub async fn run_malformed(&self, spec: &MalformedSpec, state: &RunState) -> u64 {
        self.malformed_loop(spec, state, self.rng(0)).await
    }

    /// Run every vector concurrently; returns once all of them are joined
    pub async fn run_mixed(&self, spec: &MixedSpec, state: &Arc<RunState>) -> u64 {
        let mut tasks = JoinSet::new();

        for (index, vector) in spec.vectors.iter().enumerate() {
            let engine = self.clone();
            let state = Arc::clone(state);
            let vector = vector.clone();
            tasks.spawn(async move { engine.run_vector(index, &vector, &state).await });
        }

        let mut total = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(sent) => total += sent,
                Err(e) => error!("Mixed sub-task aborted: {}", e),
            }
        }
        total
    }

    /// Any profile except `mixed`
    pub(crate) async fn run_single(&self, spec: &ProfileSpec, state: &RunState, salt: u64) -> u64 {
        match spec {
            ProfileSpec::Normal(s) => self.normal_loop(s, state, self.rng(salt)).await,
            ProfileSpec::Flood(s) => self.flood_loop(s, state).await,
            ProfileSpec::Scan(s) => self.scan_loop(s, state).await,
            ProfileSpec::UnauthorizedWrite(s) => self.write_loop(s, state, self.rng(salt)).await,
            ProfileSpec::Malformed(s) => self.malformed_loop(s, state, self.rng(salt)).await,
            ProfileSpec::Mixed(_) => {
                warn!("Nested mixed profile skipped");
                0
            },
        }
    }

    async fn run_vector(&self, index: usize, vector: &MixedVector, state: &RunState) -> u64 {
        let mut sent = 0;

        for round in 0..vector.repeats {
            if state.stop_requested() {
                break;
            }

            let salt = ((index as u64 + 1) << 32) | u64::from(round);
            sent += self.run_single(&vector.profile, state, salt).await;
            debug!(
                "Mixed vector {} ({}) round {}/{} done",
                index,
                vector.profile.name(),
                round + 1,
                vector.repeats
            );

            if round + 1 < vector.repeats && !pace(state, vector.pause).await {
                break;
            }
        }

        sent
    }

    async fn normal_loop(&self, spec: &NormalSpec, state: &RunState, rng: StdRng) -> u64 {
        let started = Instant::now();
        let interval = pacing_interval(spec.rate);
        let mut next_send = started;
        let mut sent = 0;

        for request in NormalFrames::new(rng) {
            if started.elapsed() >= spec.duration || state.stop_requested() {
                break;
            }
            if self.transmit(&request.encode(), None, state).await.is_sent() {
                sent += 1;
            }
            next_send += interval;
            if !pace_until(state, next_send).await {
                break;
            }
        }

        sent
    }

    async fn flood_loop(&self, spec: &FloodSpec, state: &RunState) -> u64 {
        let started = Instant::now();
        let interval = (!spec.is_unpaced()).then(|| pacing_interval(spec.rate));
        let mut next_send = started;
        let mut sent = 0;

        if spec.duration.is_none() {
            info!("Flood running until stopped ({} pps)", spec.rate);
        }

        for request in FloodFrames::new() {
            let expired = spec
                .duration
                .is_some_and(|limit| started.elapsed() >= limit);
            if expired || state.stop_requested() {
                break;
            }
            if self.transmit(&request.encode(), None, state).await.is_sent() {
                sent += 1;
            }
            let keep_going = match interval {
                Some(interval) => {
                    next_send += interval;
                    pace_until(state, next_send).await
                },
                None => pace(state, Duration::ZERO).await,
            };
            if !keep_going {
                break;
            }
        }

        sent
    }

    async fn scan_loop(&self, spec: &ScanSpec, state: &RunState) -> u64 {
        let mut sent = 0;

        for (port, request) in ScanTargets::new(spec.start_port, spec.end_port) {
            if state.stop_requested() {
                break;
            }
            if self
                .transmit(&request.encode(), Some(port), state)
                .await
                .is_sent()
            {
                sent += 1;
            }
            if !pace(state, spec.delay).await {
                break;
            }
        }

        debug!(
            "Scan {}..{}: {} of {} ports accepted",
            spec.start_port,
            spec.end_port,
            sent,
            spec.port_count()
        );
        sent
    }

    async fn write_loop(&self, spec: &WriteSpec, state: &RunState, rng: StdRng) -> u64 {
        let mut sent = 0;

        for request in WriteFrames::new(rng).take(spec.count as usize) {
            if state.stop_requested() {
                break;
            }
            if self.transmit(&request.encode(), None, state).await.is_sent() {
                sent += 1;
            }
            if !pace(state, spec.delay).await {
                break;
            }
        }

        sent
    }

    async fn malformed_loop(&self, spec: &MalformedSpec, state: &RunState, rng: StdRng) -> u64 {
        let mut sent = 0;

        for frame in MalformedFrames::new(rng).take(spec.count as usize) {
            if state.stop_requested() {
                break;
            }
            if self.transmit(&frame, None, state).await.is_sent() {
                sent += 1;
            }
            if !pace(state, spec.delay).await {
                break;
            }
        }

        sent
    }

    fn rng(&self, salt: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Wait until `deadline`, waking early on stop. Returns false once a stop was requested.
///
/// Rate loops step `deadline` by a fixed interval per send, so timer rounding never
/// accumulates. A deadline already passed only yields and the loop catches up.
pub(crate) async fn pace_until(state: &RunState, deadline: Instant) -> bool {
    if deadline <= Instant::now() {
        tokio::task::yield_now().await;
    } else {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {},
            () = state.stopped() => {},
        }
    }
    !state.stop_requested()
}

/// Wait `delay`, waking early on stop. Returns false once a stop was requested.
///
/// A zero delay still yields so unpaced loops cannot starve the runtime.
pub(crate) async fn pace(state: &RunState, delay: Duration) -> bool {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::select! {
            () = tokio::time::sleep(delay) => {},
            () = state.stopped() => {},
        }
    }
    !state.stop_requested()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::generators::{NORMAL_ADDRESS_RANGE, NORMAL_COUNT_RANGE, WRITE_ADDRESS_RANGE};
    use crate::test_utils::{DeliveryPolicy, RecordingSink};
    use gridgen_protocols::modbus::FC_WRITE_MULTIPLE_REGISTERS;
    use gridgen_protocols::{FrameKind, RequestFrame};
    use std::collections::HashSet;

    fn engine(policy: DeliveryPolicy) -> TrafficEngine<RecordingSink> {
        TrafficEngine::new(RecordingSink::new(policy))
    }

    fn decoded(engine: &TrafficEngine<RecordingSink>) -> Vec<RequestFrame> {
        engine
            .sink()
            .attempts()
            .iter()
            .map(|a| RequestFrame::decode(a.frame.as_bytes()).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_paced_by_rate() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::Normal(NormalSpec {
            duration: Duration::from_secs(1),
            rate: 4,
        });

        let sent = engine.run_profile(&spec, &state).await;

        assert_eq!(sent, 4);
        assert_eq!(state.packets_sent(), 4);

        let requests = decoded(&engine);
        let ids: Vec<u16> = requests.iter().map(|r| r.transaction_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        for r in &requests {
            assert!(NORMAL_ADDRESS_RANGE.contains(&r.address));
            assert!(NORMAL_COUNT_RANGE.contains(&r.count));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_transmissions_are_not_counted() {
        let engine = engine(DeliveryPolicy::FailEveryNth(3));
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::UnauthorizedWrite(WriteSpec {
            count: 10,
            delay: Duration::from_millis(200),
        });

        let sent = engine.run_profile(&spec, &state).await;

        // Attempts 3, 6 and 9 fail
        assert_eq!(engine.sink().attempt_count(), 10);
        assert_eq!(sent, 7);
        assert_eq!(state.packets_sent(), 7);
        assert_eq!(engine.sink().delivered_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_target_sends_nothing_but_completes() {
        let engine = engine(DeliveryPolicy::Never);
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::Malformed(MalformedSpec {
            count: 5,
            ..Default::default()
        });

        assert_eq!(engine.run_profile(&spec, &state).await, 0);
        assert_eq!(engine.sink().attempt_count(), 5);
        assert_eq!(state.packets_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_targets_each_port_once() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = ScanSpec {
            start_port: 500,
            end_port: 520,
            delay: Duration::from_millis(100),
        };

        let sent = engine.run_scan(&spec, &state).await;
        assert_eq!(sent, 20);

        let attempts = engine.sink().attempts();
        let ports: Vec<u16> = attempts.iter().map(|a| a.port.unwrap()).collect();
        let unique: HashSet<u16> = ports.iter().copied().collect();
        assert_eq!(ports.len(), 20);
        assert_eq!(unique.len(), 20);
        assert_eq!(ports, (500..520).collect::<Vec<_>>());

        for attempt in &attempts {
            let request = RequestFrame::decode(attempt.frame.as_bytes()).unwrap();
            assert_eq!(Some(request.transaction_id), attempt.port);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_write_envelope() {
        let engine = engine(DeliveryPolicy::Always).with_seed(Some(5));
        let state = Arc::new(RunState::new());
        let spec = WriteSpec {
            count: 50,
            delay: Duration::from_millis(200),
        };

        assert_eq!(engine.run_unauthorized_write(&spec, &state).await, 50);

        for (i, request) in decoded(&engine).iter().enumerate() {
            assert_eq!(request.function_code, FC_WRITE_MULTIPLE_REGISTERS);
            assert_eq!(request.count, 1);
            assert!(WRITE_ADDRESS_RANGE.contains(&request.address));
            assert_eq!(request.transaction_id, 100 + i as u16);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_sent() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());

        let sent = engine
            .run_malformed(&MalformedSpec::default(), &state)
            .await;

        assert_eq!(sent, 10);
        assert!(engine
            .sink()
            .attempts()
            .iter()
            .all(|a| a.frame.kind() == FrameKind::Malformed && a.port.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_flood_stops_on_request() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::Flood(FloodSpec {
            duration: None,
            rate: 1000,
        });

        let handle = {
            let engine = engine.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move { engine.run_profile(&spec, &state).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        state.request_stop();

        let sent = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(sent > 0);
        assert_eq!(sent, state.packets_sent());

        let first = decoded(&engine)[0];
        assert_eq!(first.transaction_id, 10_000);
        assert_eq!((first.address, first.count), (100, 10));
    }

    #[tokio::test]
    async fn test_flood_above_threshold_is_unpaced() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = FloodSpec {
            duration: Some(Duration::from_millis(30)),
            rate: 20_000,
        };

        let sent = engine.run_flood(&spec, &state).await;

        // Far more than a paced loop could manage in 30 ms at 1 ms steps
        assert!(sent > 30, "sent {sent}");
        assert_eq!(sent as usize, engine.sink().delivered_count());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_reaches_requested_rate() {
        for rate in [2_000u32, 5_000] {
            let engine = engine(DeliveryPolicy::Always);
            let state = Arc::new(RunState::new());
            let spec = FloodSpec {
                duration: Some(Duration::from_secs(1)),
                rate,
            };

            let sent = engine.run_flood(&spec, &state).await;

            // Millisecond timer granularity must not cap the rate
            let expected = u64::from(rate);
            assert!(
                sent >= expected * 98 / 100 && sent <= expected,
                "rate {rate}: sent {sent}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_stays_paced_at_high_rate() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = NormalSpec {
            duration: Duration::from_millis(10),
            rate: 20_000,
        };

        // Only the flood profile goes unpaced above the threshold
        let sent = engine.run_normal(&spec, &state).await;
        assert!((190..=200).contains(&sent), "sent {sent}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_long_normal_run() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::Normal(NormalSpec {
            duration: Duration::from_secs(3600),
            rate: 1,
        });

        let handle = {
            let engine = engine.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move { engine.run_profile(&spec, &state).await })
        };

        tokio::time::sleep(Duration::from_millis(5500)).await;
        state.request_stop();

        let sent = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start_sends_nothing() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        state.request_stop();

        for spec in [
            ProfileSpec::Normal(NormalSpec::default()),
            ProfileSpec::Flood(FloodSpec::default()),
            ProfileSpec::Scan(ScanSpec::default()),
            ProfileSpec::UnauthorizedWrite(WriteSpec::default()),
            ProfileSpec::Malformed(MalformedSpec::default()),
            ProfileSpec::Mixed(MixedSpec::default()),
        ] {
            assert_eq!(engine.run_profile(&spec, &state).await, 0, "{}", spec.name());
        }
        assert_eq!(engine.sink().attempt_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mixed_counts_every_delivery() {
        const VECTORS: usize = 4;
        const WRITES: u32 = 25;
        const REPEATS: u32 = 2;

        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());
        let spec = ProfileSpec::Mixed(MixedSpec {
            vectors: (0..VECTORS)
                .map(|_| MixedVector {
                    profile: ProfileSpec::UnauthorizedWrite(WriteSpec {
                        count: WRITES,
                        delay: Duration::ZERO,
                    }),
                    repeats: REPEATS,
                    pause: Duration::ZERO,
                })
                .collect(),
        });

        let sent = engine.run_profile(&spec, &state).await;
        let expected = VECTORS as u64 * u64::from(WRITES * REPEATS);

        assert_eq!(sent, expected);
        assert_eq!(state.packets_sent(), expected);
        assert_eq!(engine.sink().attempt_count() as u64, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_default_runs_all_vectors() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());

        let sent = engine
            .run_mixed(&MixedSpec::default(), &state)
            .await;

        let attempts = engine.sink().attempts();
        let scans = attempts.iter().filter(|a| a.port.is_some()).count();
        let writes = decoded_requests(&attempts)
            .filter(|r| r.function_code == FC_WRITE_MULTIPLE_REGISTERS)
            .count();

        assert_eq!(scans, 3 * 10);
        assert_eq!(writes, 10 * 5);
        assert!(sent as usize > scans + writes);
        assert_eq!(sent, state.packets_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_stops_all_vectors() {
        let engine = engine(DeliveryPolicy::Always);
        let state = Arc::new(RunState::new());

        let handle = {
            let engine = engine.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                engine
                    .run_profile(&ProfileSpec::Mixed(MixedSpec::default()), &state)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        state.request_stop();

        let sent = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent, state.packets_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_makes_runs_reproducible() {
        let spec = NormalSpec {
            duration: Duration::from_secs(2),
            rate: 10,
        };

        let a = engine(DeliveryPolicy::Always).with_seed(Some(42));
        let b = engine(DeliveryPolicy::Always).with_seed(Some(42));
        a.run_normal(&spec, &RunState::new()).await;
        b.run_normal(&spec, &RunState::new()).await;

        let bytes = |e: &TrafficEngine<RecordingSink>| -> Vec<Vec<u8>> {
            e.sink()
                .attempts()
                .iter()
                .map(|a| a.frame.as_bytes().to_vec())
                .collect()
        };
        assert_eq!(bytes(&a), bytes(&b));
        assert_eq!(bytes(&a).len(), 20);
    }

    fn decoded_requests(
        attempts: &[crate::test_utils::Attempt],
    ) -> impl Iterator<Item = RequestFrame> + '_ {
        attempts
            .iter()
            .filter_map(|a| RequestFrame::decode(a.frame.as_bytes()).ok())
    }
}
