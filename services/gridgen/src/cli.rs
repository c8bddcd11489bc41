//! Command line interface

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use errors::GridgenResult;

use crate::config::GeneratorConfig;
use crate::profile::{
    FloodSpec, MalformedSpec, MixedSpec, NormalSpec, ProfileKind, ProfileSpec, ScanSpec,
    WriteSpec,
};
use crate::suite::SuiteSpec;

#[derive(Debug, Parser)]
#[command(name = "gridgen")]
#[command(about = "Synthetic Modbus/TCP traffic generator for exercising intrusion detection")]
#[command(long_about = "Synthetic Modbus/TCP traffic generator for exercising intrusion detection

Profiles:
  normal      Baseline FC03 polling at a steady rate
  flood       High-rate identical FC03 requests
  scan        One connection per port across a range
  write       FC16 writes into the protected register block
  malformed   Random byte strings that are not valid Modbus
  mixed       Flood, scan and writes concurrently
  suite       Every profile in sequence, framed by baseline traffic

Examples:
  gridgen -H 192.168.1.10 normal -d 60 -r 5
  gridgen flood -d 0                    # until Ctrl+C
  gridgen scan --start 500 --end 520
  gridgen --seed 42 malformed -n 100
  gridgen mixed -n 2 --pause-ms 500")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Target host (default: local outbound address)
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Target port (default: 502)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Connect/write timeout per frame in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// RNG seed for reproducible traffic
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Progress log period in seconds (0 disables)
    #[arg(long, global = true)]
    pub report_interval: Option<u64>,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Baseline polling traffic
    Normal {
        /// Seconds to run
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// Packets per second
        #[arg(short, long, default_value_t = 10)]
        rate: u32,
    },

    /// Request flood
    Flood {
        /// Seconds to run (0 runs until interrupted)
        #[arg(short, long, default_value_t = 10)]
        duration: u64,

        /// Packets per second (10000 and above is unpaced)
        #[arg(short, long, default_value_t = 1000)]
        rate: u32,
    },

    /// Port scan
    Scan {
        /// First port
        #[arg(long, default_value_t = 500)]
        start: u16,

        /// End port (exclusive)
        #[arg(long, default_value_t = 520)]
        end: u16,

        /// Milliseconds between ports
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },

    /// Unauthorized register writes
    #[command(alias = "unauthorized-write")]
    Write {
        /// Number of writes
        #[arg(short = 'n', long, default_value_t = 50)]
        count: u32,

        /// Milliseconds between writes
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,
    },

    /// Malformed frames
    Malformed {
        /// Number of frames
        #[arg(short = 'n', long, default_value_t = 20)]
        count: u32,

        /// Milliseconds between frames
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },

    /// Concurrent flood, scan and write vectors
    Mixed {
        /// Repeats of every vector (overrides the built-in counts)
        #[arg(short = 'n', long)]
        repeats: Option<u32>,

        /// Milliseconds between repeats of every vector
        #[arg(long)]
        pause_ms: Option<u64>,

        /// Flood bursts (default 5)
        #[arg(long)]
        flood_repeats: Option<u32>,

        /// Scan passes (default 3)
        #[arg(long)]
        scan_repeats: Option<u32>,

        /// Write batches (default 10)
        #[arg(long)]
        write_repeats: Option<u32>,
    },

    /// Scripted sequence of every profile
    Suite {
        /// Seconds to pause between phases
        #[arg(long, default_value_t = 3)]
        settle: u64,
    },
}

/// What a command will run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Profile(ProfileSpec),
    Suite(SuiteSpec),
}

impl Plan {
    pub fn name(&self) -> &'static str {
        match self {
            Plan::Profile(spec) => spec.name(),
            Plan::Suite(_) => "suite",
        }
    }

    pub fn validate(&self) -> GridgenResult<()> {
        match self {
            Plan::Profile(spec) => spec.validate(),
            Plan::Suite(suite) => suite.validate(),
        }
    }
}

impl Command {
    pub fn plan(&self) -> Plan {
        let profile = match *self {
            Command::Normal { duration, rate } => ProfileSpec::Normal(NormalSpec {
                duration: Duration::from_secs(duration),
                rate,
            }),
            Command::Flood { duration, rate } => ProfileSpec::Flood(FloodSpec {
                duration: (duration > 0).then(|| Duration::from_secs(duration)),
                rate,
            }),
            Command::Scan {
                start,
                end,
                delay_ms,
            } => ProfileSpec::Scan(ScanSpec {
                start_port: start,
                end_port: end,
                delay: Duration::from_millis(delay_ms),
            }),
            Command::Write { count, delay_ms } => ProfileSpec::UnauthorizedWrite(WriteSpec {
                count,
                delay: Duration::from_millis(delay_ms),
            }),
            Command::Malformed { count, delay_ms } => ProfileSpec::Malformed(MalformedSpec {
                count,
                delay: Duration::from_millis(delay_ms),
            }),
            Command::Mixed {
                repeats,
                pause_ms,
                flood_repeats,
                scan_repeats,
                write_repeats,
            } => {
                let mut mixed = MixedSpec::default();
                for vector in &mut mixed.vectors {
                    let specific = match vector.profile.kind() {
                        ProfileKind::Flood => flood_repeats,
                        ProfileKind::Scan => scan_repeats,
                        ProfileKind::UnauthorizedWrite => write_repeats,
                        _ => None,
                    };
                    if let Some(n) = specific.or(repeats) {
                        vector.repeats = n;
                    }
                    if let Some(ms) = pause_ms {
                        vector.pause = Duration::from_millis(ms);
                    }
                }
                ProfileSpec::Mixed(mixed)
            },
            Command::Suite { settle } => {
                return Plan::Suite(SuiteSpec {
                    settle: Duration::from_secs(settle),
                    ..SuiteSpec::full()
                })
            },
        };
        Plan::Profile(profile)
    }
}

impl Cli {
    /// Flags override file and environment settings
    pub fn apply_overrides(&self, config: &mut GeneratorConfig) {
        if let Some(host) = &self.host {
            config.target.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.target.port = port;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.transmit_timeout_ms = timeout_ms;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(secs) = self.report_interval {
            config.report_interval_secs = secs;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.dir = Some(dir.clone());
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gridgen").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_profile_defaults() {
        assert_eq!(
            parse(&["normal"]).command.plan(),
            Plan::Profile(ProfileSpec::Normal(NormalSpec {
                duration: Duration::from_secs(30),
                rate: 10,
            }))
        );
        assert_eq!(
            parse(&["flood"]).command.plan(),
            Plan::Profile(ProfileSpec::Flood(FloodSpec {
                duration: Some(Duration::from_secs(10)),
                rate: 1000,
            }))
        );
        assert_eq!(
            parse(&["scan"]).command.plan(),
            Plan::Profile(ProfileSpec::Scan(ScanSpec::default()))
        );
        assert_eq!(
            parse(&["write"]).command.plan(),
            Plan::Profile(ProfileSpec::UnauthorizedWrite(WriteSpec {
                count: 50,
                ..Default::default()
            }))
        );
        assert_eq!(
            parse(&["malformed"]).command.plan(),
            Plan::Profile(ProfileSpec::Malformed(MalformedSpec {
                count: 20,
                ..Default::default()
            }))
        );
        assert_eq!(
            parse(&["mixed"]).command.plan(),
            Plan::Profile(ProfileSpec::Mixed(MixedSpec::default()))
        );
        assert_eq!(parse(&["suite"]).command.plan(), Plan::Suite(SuiteSpec::full()));
    }

    #[test]
    fn test_flood_zero_duration_is_unbounded() {
        let plan = parse(&["flood", "-d", "0", "-r", "20000"]).command.plan();
        assert_eq!(
            plan,
            Plan::Profile(ProfileSpec::Flood(FloodSpec {
                duration: None,
                rate: 20_000,
            }))
        );
        plan.validate().unwrap();
    }

    #[test]
    fn test_mixed_parameters() {
        let repeats_of = |plan: Plan| -> Vec<(ProfileKind, u32, Duration)> {
            let Plan::Profile(ProfileSpec::Mixed(mixed)) = plan else {
                panic!("not a mixed plan");
            };
            mixed
                .vectors
                .iter()
                .map(|v| (v.profile.kind(), v.repeats, v.pause))
                .collect()
        };

        let scaled = repeats_of(parse(&["mixed", "--repeats", "2"]).command.plan());
        assert!(scaled.iter().all(|(_, repeats, _)| *repeats == 2));

        let tuned = repeats_of(
            parse(&["mixed", "-n", "4", "--flood-repeats", "7", "--pause-ms", "500"])
                .command
                .plan(),
        );
        let half_second = Duration::from_millis(500);
        assert_eq!(
            tuned,
            vec![
                (ProfileKind::Flood, 7, half_second),
                (ProfileKind::Scan, 4, half_second),
                (ProfileKind::UnauthorizedWrite, 4, half_second),
            ]
        );

        let defaults = repeats_of(parse(&["mixed", "--scan-repeats", "1"]).command.plan());
        assert_eq!(
            defaults,
            vec![
                (ProfileKind::Flood, 5, Duration::from_secs(1)),
                (ProfileKind::Scan, 1, Duration::from_secs(3)),
                (ProfileKind::UnauthorizedWrite, 10, Duration::from_secs(2)),
            ]
        );

        let zero = parse(&["mixed", "--write-repeats", "0"]).command.plan();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_unauthorized_write_alias() {
        let cli = parse(&["unauthorized-write", "-n", "5"]);
        assert_eq!(cli.command.plan().name(), "unauthorized-write");
    }

    #[test]
    fn test_invalid_parameters_fail_validation() {
        assert!(parse(&["normal", "-r", "0"]).command.plan().validate().is_err());
        assert!(parse(&["scan", "--start", "520", "--end", "500"])
            .command
            .plan()
            .validate()
            .is_err());
        assert!(parse(&["malformed", "-n", "0"]).command.plan().validate().is_err());
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = parse(&[
            "scan",
            "-H",
            "10.0.0.5",
            "-p",
            "1502",
            "--timeout-ms",
            "300",
            "--seed",
            "9",
            "--report-interval",
            "0",
            "--log-dir",
            "/tmp/gg",
            "-v",
        ]);

        let mut config = GeneratorConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.target.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.target.port, 1502);
        assert_eq!(config.transmit_timeout_ms, 300);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.report_interval(), None);
        assert_eq!(config.logging.dir, Some(PathBuf::from("/tmp/gg")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_no_flags_leave_config_untouched() {
        let cli = parse(&["mixed"]);
        let mut config = GeneratorConfig::default();
        config.seed = Some(3);
        cli.apply_overrides(&mut config);

        let mut expected = GeneratorConfig::default();
        expected.seed = Some(3);
        assert_eq!(config, expected);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        assert!(Cli::try_parse_from(["gridgen", "syn"]).is_err());
    }
}
