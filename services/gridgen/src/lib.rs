//! gridgen - synthetic Modbus/TCP traffic generator
//!
//! Produces benign polling and five adversarial patterns (flood, scan, unauthorized
//! write, malformed frames, and a concurrent mix) against a single target so that
//! intrusion detection on the monitored side has something to detect.
//!
//! The library drives a `FrameSink`; the `gridgen` binary wires it to TCP.

pub mod cli;
pub mod config;
pub mod engine;
pub mod generators;
pub mod profile;
pub mod reporter;
pub mod state;
pub mod suite;
pub mod test_utils;

pub use config::GeneratorConfig;
pub use engine::TrafficEngine;
pub use profile::{
    FloodSpec, MalformedSpec, MixedSpec, MixedVector, NormalSpec, ProfileKind, ProfileSpec,
    ScanSpec, WriteSpec,
};
pub use reporter::spawn_progress_reporter;
pub use state::RunState;
pub use suite::{PhaseResult, SuitePhase, SuiteReport, SuiteSpec};
