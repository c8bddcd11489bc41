//! gridgen binary: parse flags, load config, run one plan, print a summary

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use colored::*;
use common::cancel_on_shutdown;
use errors::GridgenError;
use gridgen::cli::{Cli, Plan};
use gridgen::{spawn_progress_reporter, GeneratorConfig, RunState, SuiteReport, TrafficEngine};
use gridgen_protocols::{Target, TcpFrameSink};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            let code = e
                .downcast_ref::<GridgenError>()
                .map_or(1, GridgenError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = GeneratorConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let plan = cli.command.plan();
    plan.validate()?;

    common::logging::init_with_config(&config.log_config(!cli.no_color))?;

    let target = config.resolve_target()?;
    let engine = TrafficEngine::new(TcpFrameSink::new(target.clone(), config.transmit_timeout()))
        .with_seed(config.seed);

    let state = Arc::new(RunState::new());
    let watcher = cancel_on_shutdown(state.stop_token().clone());

    let reporter_token = state.stop_token().child_token();
    let reporter = config
        .report_interval()
        .map(|every| spawn_progress_reporter(Arc::clone(&state), every, reporter_token.clone()));

    print_banner(&plan, &target, &config);
    info!(
        "Starting {} against {} (timeout {} ms, seed {:?})",
        plan.name(),
        target,
        config.transmit_timeout_ms,
        config.seed
    );

    let started = Instant::now();
    let (total, suite) = match &plan {
        Plan::Profile(spec) => (engine.run_profile(spec, &state).await, None),
        Plan::Suite(spec) => {
            let report = engine.run_suite(spec, &state).await;
            (report.total, Some(report))
        },
    };
    let elapsed = started.elapsed();
    let interrupted = state.stop_requested();

    reporter_token.cancel();
    if let Some(handle) = reporter {
        if let Err(e) = handle.await {
            warn!("Progress reporter ended abnormally: {}", e);
        }
    }
    watcher.abort();

    print_summary(&plan, total, elapsed, interrupted, suite.as_ref());
    Ok(())
}

fn print_banner(plan: &Plan, target: &Target, config: &GeneratorConfig) {
    println!("{}", "gridgen - Modbus/TCP traffic generator".bold());
    println!("  Profile: {}", plan.name().cyan());
    println!("  Target:  {}", target.to_string().cyan());
    if let Some(seed) = config.seed {
        println!("  Seed:    {}", seed);
    }
    println!("  Press Ctrl+C to stop\n");
}

fn print_summary(
    plan: &Plan,
    total: u64,
    elapsed: Duration,
    interrupted: bool,
    suite: Option<&SuiteReport>,
) {
    println!("\n{}", "=== Summary ===".bold());

    if let Some(report) = suite {
        for (index, phase) in report.phases.iter().enumerate() {
            println!(
                "  {}. {:<22} {:<20} {}",
                index + 1,
                phase.title,
                phase.profile.as_str().dimmed(),
                phase.packets_sent
            );
        }
    }

    let status = if interrupted {
        "INTERRUPTED".yellow()
    } else {
        "COMPLETED".green()
    };

    println!("  Profile:     {}", plan.name().cyan());
    println!("  Frames sent: {}", total.to_string().green().bold());
    println!("  Elapsed:     {:.1}s", elapsed.as_secs_f64());
    println!("  Status:      {}", status);
}
