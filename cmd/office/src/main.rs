//! Office simulation
//!
//! Runs the auto-arrival loop against one office and prints the observer's
//! view on every refresh. Ctrl-C (or the run timer) stops arrivals, lets the
//! visitors still inside finish without delays, and prints a summary.
//!
//! # Environment Variables
//!
//! - `OFFICE_POLICY=4-tier` - 2-tier (TA > Student) or 4-tier
//! - `OFFICE_RUN_SECS=30` - Stop arrivals after this many seconds
//! - `OFFICE_REFRESH_MS=500` - Observer refresh period
//! - `OFFICE_TIME_SCALE=1.0` - Multiply every visitor delay
//! - `OFFICE_PATIENCE_MS` - Visitors give up after waiting this long
//! - `OFFICE_SEED` - Reproducible arrivals and delays
//! - `OFFICE_LOG_LEVEL=debug` - off, error, warn, info, debug, trace

use std::process::ExitCode;
use std::time::{Duration, Instant};

use office::{
    env_get, install_interrupt_handler, interrupted, kerror, kinfo, kwarn, Observer, OfficeResult,
    SimConfig, Simulator, VisitorState,
};

// OFFICE_POLICY=2-tier OFFICE_TIME_SCALE=0.25 cargo run -p office-cmd
fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            kerror!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> OfficeResult<bool> {
    let run_for = Duration::from_secs(env_get("OFFICE_RUN_SECS", 30u64));
    let refresh = Duration::from_millis(env_get("OFFICE_REFRESH_MS", 500u64).max(10));

    if let Err(e) = install_interrupt_handler() {
        kwarn!("no Ctrl-C handling: {}", e);
    }

    let config = SimConfig::from_env();
    println!("=== Office ({} policy, {:?} run) ===\n", config.policy, run_for);

    let sim = Simulator::new(config)?;
    let mut observer = Observer::for_simulator(&sim);
    sim.start_auto()?;

    let start = Instant::now();
    while start.elapsed() < run_for && !interrupted() {
        std::thread::sleep(refresh);
        observer.tick();
        println!("{}", observer.render());
    }

    if interrupted() {
        kinfo!("interrupted, shutting down");
    }
    sim.shutdown();

    // Let the observer see the stragglers through the door
    while sim.active_visitors() > 0 {
        std::thread::sleep(refresh.min(Duration::from_millis(50)));
        observer.tick();
    }
    let report = sim.join();
    observer.tick();
    println!("{}", observer.render());

    println!("=== Summary ===");
    println!(
        "visitors: {} departed, {} gave up, {} failed",
        report.departed(),
        report.abandoned(),
        report.failed()
    );
    for (tier, def) in sim.policy().tiers() {
        println!(
            "  {:<22} admitted {:>4}  max queue {:>3}",
            def.name,
            report.stats.admissions[tier.as_usize()],
            report.stats.max_depth[tier.as_usize()]
        );
    }
    println!(
        "wakeups: {} ({} rechecks blocked again), events: {} published, {} dropped",
        report.stats.wakeups,
        report.stats.failed_rechecks,
        report.events_published,
        report.events_dropped
    );
    for (id, outcome) in &report.outcomes {
        match outcome {
            Ok(VisitorState::Departed) | Ok(VisitorState::Abandoned) => {}
            Ok(state) => kwarn!("{} ended in {:?}", id, state),
            Err(e) => kerror!("{}: {}", id, e),
        }
    }

    Ok(report.failed() == 0)
}
