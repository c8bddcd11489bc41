//! Profile descriptions
//!
//! A `ProfileSpec` is a stateless description of one of the six traffic behaviors.
//! `validate()` is the only place parameter errors are raised; once a spec validates,
//! running it cannot fail.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use errors::{GridgenError, GridgenResult};

/// Flood rate at and above which the loop stops sleeping between sends
pub const UNPACED_RATE_THRESHOLD: u32 = 10_000;

pub const DEFAULT_SCAN_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MALFORMED_DELAY: Duration = Duration::from_millis(100);

/// The six profile names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Normal,
    Flood,
    Scan,
    UnauthorizedWrite,
    Malformed,
    Mixed,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 6] = [
        ProfileKind::Normal,
        ProfileKind::Flood,
        ProfileKind::Scan,
        ProfileKind::UnauthorizedWrite,
        ProfileKind::Malformed,
        ProfileKind::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Normal => "normal",
            ProfileKind::Flood => "flood",
            ProfileKind::Scan => "scan",
            ProfileKind::UnauthorizedWrite => "unauthorized-write",
            ProfileKind::Malformed => "malformed",
            ProfileKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = GridgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ProfileKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| GridgenError::config(format!("Unknown profile '{s}'")))
    }
}

/// Baseline polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalSpec {
    pub duration: Duration,
    /// Packets per second
    pub rate: u32,
}

impl Default for NormalSpec {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            rate: 10,
        }
    }
}

/// Request flood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodSpec {
    /// `None` runs until a stop is requested
    pub duration: Option<Duration>,
    /// Packets per second
    pub rate: u32,
}

impl FloodSpec {
    /// Send back to back instead of on a schedule
    pub fn is_unpaced(&self) -> bool {
        self.rate >= UNPACED_RATE_THRESHOLD
    }
}

impl Default for FloodSpec {
    fn default() -> Self {
        Self {
            duration: Some(Duration::from_secs(10)),
            rate: 1000,
        }
    }
}

/// Connection fan-out over a port range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSpec {
    pub start_port: u16,
    /// Exclusive
    pub end_port: u16,
    pub delay: Duration,
}

impl Default for ScanSpec {
    fn default() -> Self {
        Self {
            start_port: 500,
            end_port: 520,
            delay: DEFAULT_SCAN_DELAY,
        }
    }
}

impl ScanSpec {
    pub fn port_count(&self) -> usize {
        usize::from(self.end_port.saturating_sub(self.start_port))
    }
}

/// Writes into the protected register block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSpec {
    pub count: u32,
    pub delay: Duration,
}

impl Default for WriteSpec {
    fn default() -> Self {
        Self {
            count: 20,
            delay: DEFAULT_WRITE_DELAY,
        }
    }
}

/// Random garbage payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSpec {
    pub count: u32,
    pub delay: Duration,
}

impl Default for MalformedSpec {
    fn default() -> Self {
        Self {
            count: 10,
            delay: DEFAULT_MALFORMED_DELAY,
        }
    }
}

/// One repeating sub-task of a mixed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedVector {
    pub profile: ProfileSpec,
    pub repeats: u32,
    /// Pause between repeats
    pub pause: Duration,
}

/// Concurrent multi-vector attack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedSpec {
    pub vectors: Vec<MixedVector>,
}

impl Default for MixedSpec {
    /// Flood bursts, repeated scans and write attempts side by side
    fn default() -> Self {
        Self {
            vectors: vec![
                MixedVector {
                    profile: ProfileSpec::Flood(FloodSpec {
                        duration: Some(Duration::from_secs(2)),
                        rate: 500,
                    }),
                    repeats: 5,
                    pause: Duration::from_secs(1),
                },
                MixedVector {
                    profile: ProfileSpec::Scan(ScanSpec {
                        start_port: 500,
                        end_port: 510,
                        delay: DEFAULT_SCAN_DELAY,
                    }),
                    repeats: 3,
                    pause: Duration::from_secs(3),
                },
                MixedVector {
                    profile: ProfileSpec::UnauthorizedWrite(WriteSpec {
                        count: 5,
                        delay: DEFAULT_WRITE_DELAY,
                    }),
                    repeats: 10,
                    pause: Duration::from_secs(2),
                },
            ],
        }
    }
}

/// One of the six traffic behaviors with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSpec {
    Normal(NormalSpec),
    Flood(FloodSpec),
    Scan(ScanSpec),
    UnauthorizedWrite(WriteSpec),
    Malformed(MalformedSpec),
    Mixed(MixedSpec),
}

impl ProfileSpec {
    pub fn kind(&self) -> ProfileKind {
        match self {
            ProfileSpec::Normal(_) => ProfileKind::Normal,
            ProfileSpec::Flood(_) => ProfileKind::Flood,
            ProfileSpec::Scan(_) => ProfileKind::Scan,
            ProfileSpec::UnauthorizedWrite(_) => ProfileKind::UnauthorizedWrite,
            ProfileSpec::Malformed(_) => ProfileKind::Malformed,
            ProfileSpec::Mixed(_) => ProfileKind::Mixed,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Reject parameters no run could honour
    pub fn validate(&self) -> GridgenResult<()> {
        let profile = self.name();
        let invalid = |reason: String| -> GridgenResult<()> {
            Err(GridgenError::invalid_parameter(profile, reason))
        };

        match self {
            ProfileSpec::Normal(spec) => {
                if spec.rate == 0 {
                    return invalid("rate must be at least 1 packet/s".to_string());
                }
                if spec.duration.is_zero() {
                    return invalid("duration must be positive".to_string());
                }
            },
            ProfileSpec::Flood(spec) => {
                if spec.rate == 0 {
                    return invalid("rate must be at least 1 packet/s".to_string());
                }
                if spec.duration.is_some_and(|d| d.is_zero()) {
                    return invalid(
                        "duration must be positive (omit it to run until stopped)".to_string(),
                    );
                }
            },
            ProfileSpec::Scan(spec) => {
                if spec.start_port == 0 {
                    return invalid("start port must be at least 1".to_string());
                }
                if spec.end_port <= spec.start_port {
                    return invalid(format!(
                        "empty port range {}..{} (end is exclusive)",
                        spec.start_port, spec.end_port
                    ));
                }
            },
            ProfileSpec::UnauthorizedWrite(WriteSpec { count, .. })
            | ProfileSpec::Malformed(MalformedSpec { count, .. }) => {
                if *count == 0 {
                    return invalid("count must be at least 1".to_string());
                }
            },
            ProfileSpec::Mixed(spec) => {
                if spec.vectors.is_empty() {
                    return invalid("at least one attack vector is required".to_string());
                }
                for (index, vector) in spec.vectors.iter().enumerate() {
                    if matches!(vector.profile, ProfileSpec::Mixed(_)) {
                        return invalid(format!("vector {index}: mixed profiles cannot be nested"));
                    }
                    if vector.repeats == 0 {
                        return invalid(format!("vector {index}: repeats must be at least 1"));
                    }
                    vector.profile.validate()?;
                }
            },
        }

        Ok(())
    }
}

/// Send spacing for `rate` packets/s
pub fn pacing_interval(rate: u32) -> Duration {
    Duration::from_secs(1) / rate.max(1)
}
