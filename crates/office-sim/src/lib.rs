//! # office-sim
//!
//! Drivers around the office monitor: visitor threads, the auto-arrival
//! loop, the observer, and interrupt handling for the `office` binary.
//!
//! Visitor timing (arrival cadence, consult and task durations) is random
//! and has no bearing on correctness; set `time_scale(0.0)` to run every
//! visit back to back.

pub mod config;
pub mod visitor;
pub mod simulator;
pub mod observer;
pub mod signal;

// Re-exports
pub use config::{DelayRange, RoleMix, RoleSampler, SimConfig};
pub use visitor::{run_visitor, VisitContext};
pub use simulator::{SimReport, Simulator};
pub use observer::{OfficeView, Observer};
pub use signal::{clear_interrupted, install_interrupt_handler, interrupted};
