//! Scripted demo sequence
//!
//! Runs a fixed list of profiles one after another with a settle pause in between,
//! starting and ending with baseline traffic so the attacks stand out against it.

use std::sync::Arc;
use std::time::Duration;

use errors::{GridgenError, GridgenResult};
use gridgen_protocols::FrameSink;
use tracing::info;

use crate::engine::{pace, TrafficEngine};
use crate::profile::{
    FloodSpec, MalformedSpec, NormalSpec, ProfileKind, ProfileSpec, ScanSpec, WriteSpec,
    DEFAULT_SCAN_DELAY,
};
use crate::state::RunState;

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitePhase {
    pub title: String,
    pub profile: ProfileSpec,
}

impl SuitePhase {
    pub fn new(title: impl Into<String>, profile: ProfileSpec) -> Self {
        Self {
            title: title.into(),
            profile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSpec {
    pub phases: Vec<SuitePhase>,
    /// Pause between phases
    pub settle: Duration,
}

impl Default for SuiteSpec {
    fn default() -> Self {
        Self::full()
    }
}

impl SuiteSpec {
    /// Baseline, scan, flood, writes, garbage, baseline
    pub fn full() -> Self {
        let baseline = || {
            ProfileSpec::Normal(NormalSpec {
                duration: Duration::from_secs(20),
                rate: 5,
            })
        };

        Self {
            phases: vec![
                SuitePhase::new("Baseline traffic", baseline()),
                SuitePhase::new(
                    "Reconnaissance scan",
                    ProfileSpec::Scan(ScanSpec {
                        start_port: 500,
                        end_port: 520,
                        delay: DEFAULT_SCAN_DELAY,
                    }),
                ),
                SuitePhase::new(
                    "Request flood",
                    ProfileSpec::Flood(FloodSpec {
                        duration: Some(Duration::from_secs(15)),
                        rate: 800,
                    }),
                ),
                SuitePhase::new(
                    "Unauthorized writes",
                    ProfileSpec::UnauthorizedWrite(WriteSpec {
                        count: 30,
                        ..Default::default()
                    }),
                ),
                SuitePhase::new(
                    "Malformed frames",
                    ProfileSpec::Malformed(MalformedSpec {
                        count: 15,
                        ..Default::default()
                    }),
                ),
                SuitePhase::new("Return to baseline", baseline()),
            ],
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn validate(&self) -> GridgenResult<()> {
        if self.phases.is_empty() {
            return Err(GridgenError::invalid_parameter("suite", "no phases configured"));
        }
        self.phases.iter().try_for_each(|phase| phase.profile.validate())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    pub title: String,
    pub profile: ProfileKind,
    pub packets_sent: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    /// Phases that actually ran, in order
    pub phases: Vec<PhaseResult>,
    pub total: u64,
    pub interrupted: bool,
}

impl<S: FrameSink + 'static> TrafficEngine<S> {
    /// Run each phase in order. A stop request ends the current phase and skips the rest.
    pub async fn run_suite(&self, suite: &SuiteSpec, state: &Arc<RunState>) -> SuiteReport {
        let mut report = SuiteReport::default();
        let phase_count = suite.phases.len();

        for (index, phase) in suite.phases.iter().enumerate() {
            if state.stop_requested() {
                break;
            }

            info!(
                "Suite phase {}/{}: {} ({})",
                index + 1,
                phase_count,
                phase.title,
                phase.profile.name()
            );
            let sent = self.run_profile(&phase.profile, state).await;
            report.total += sent;
            report.phases.push(PhaseResult {
                title: phase.title.clone(),
                profile: phase.profile.kind(),
                packets_sent: sent,
            });

            if index + 1 < phase_count && !pace(state, suite.settle).await {
                break;
            }
        }

        report.interrupted = state.stop_requested();
        report
    }
}
