//! Stress test for the priority monitor
//!
//! Many threads enter and leave one monitor across every tier with no
//! delays. Inside the office each thread flips a shared flag and checks
//! nobody else is inside; the run fails if two ever overlap or if the
//! admission count does not add up.
//!
//! # Environment Variables
//!
//! - `STRESS_THREADS=16` - Number of contending threads
//! - `STRESS_ROUNDS=2000` - Enter/leave pairs per thread
//! - `STRESS_TIERS=4` - Number of tiers (1 to 256)

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use office::{env_get, kerror, kinfo, OfficeResult, PriorityMonitor, TierId};

fn main() -> ExitCode {
    match run() {
        Ok(0) => {
            println!("PASS");
            ExitCode::SUCCESS
        }
        Ok(failures) => {
            println!("FAIL: {} check(s) failed", failures);
            ExitCode::FAILURE
        }
        Err(e) => {
            kerror!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> OfficeResult<u64> {
    let threads: usize = env_get("STRESS_THREADS", 16);
    let rounds: usize = env_get("STRESS_ROUNDS", 2000);
    let tiers: usize = env_get("STRESS_TIERS", 4);

    println!("=== Stress: {} threads x {} rounds over {} tiers ===", threads, rounds, tiers);

    let monitor = Arc::new(PriorityMonitor::new(tiers)?);
    let inside = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let monitor = Arc::clone(&monitor);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            thread::spawn(move || -> OfficeResult<()> {
                for round in 0..rounds {
                    let tier = TierId::new(((worker + round) % tiers) as u8);
                    monitor.enter(tier, (worker, round))?;
                    if inside.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::Relaxed);
                    }
                    thread::yield_now();
                    inside.store(false, Ordering::SeqCst);
                    monitor.leave(&(worker, round))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => return Err(office::OfficeError::Panicked),
        }
    }

    let elapsed = start.elapsed();
    let stats = monitor.stats();
    let expected = (threads * rounds) as u64;
    kinfo!(
        "{} admissions in {:?} ({:.0}/s)",
        stats.total_admissions(),
        elapsed,
        stats.total_admissions() as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("admissions per tier: {:?}", stats.admissions);
    println!("max queue depth:     {:?}", stats.max_depth);
    println!(
        "wakeups: {} ({} rechecks blocked again)",
        stats.wakeups, stats.failed_rechecks
    );

    let mut failures = overlaps.load(Ordering::Relaxed);
    if failures > 0 {
        kerror!("{} admissions overlapped another occupant", failures);
    }
    if stats.total_admissions() != expected {
        kerror!("expected {} admissions, saw {}", expected, stats.total_admissions());
        failures += 1;
    }
    Ok(failures)
}
