//! # office - a single-occupant office behind a strict priority monitor
//!
//! Visitors of different roles queue for exclusive use of one office.
//! Admission follows a fixed ranking of tiers, FIFO within a tier. A
//! researcher who has been in once, left for a task and comes back queues
//! in a tier above every first-time researcher.
//!
//! ## Features
//!
//! - **Priority monitor**: one mutex, one condition variable, broadcast on
//!   leave, predicate rechecked on every wake
//! - **Tier policy as data**: 2-tier (TA > Student) and 4-tier (Returning
//!   Researcher > New Researcher > TA > Student) tables, or your own
//! - **Abandoned waits**: `enter_timeout` and `cancel` remove a waiter from
//!   anywhere in its queue
//! - **Simulation**: visitor threads, weighted auto arrivals, best-effort
//!   event feed and a snapshot-reconciling observer
//!
//! ## Quick Start
//!
//! ```ignore
//! use office::{Simulator, SimConfig, Observer, Role, PolicyKind};
//!
//! fn main() -> office::OfficeResult<()> {
//!     let sim = Simulator::new(SimConfig::for_policy(PolicyKind::FourTier))?;
//!     let mut observer = Observer::for_simulator(&sim);
//!
//!     sim.add_visitor(Role::Researcher)?;
//!     sim.add_visitor(Role::Student)?;
//!     sim.start_auto()?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     observer.tick();
//!     println!("{}", observer.render());
//!
//!     sim.shutdown();
//!     let report = sim.join();
//!     println!("{} visitors departed", report.departed());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   visitor threads ──enter/leave──▶ PriorityMonitor ◀──snapshot── Observer
//!          │                        (mutex + condvar)                 ▲
//!          └───────────── publish ──▶ EventBus ──── drain ────────────┘
//! ```

pub use office_core::*;
pub use office_sim::*;

// Re-export kprint macros for debug logging
pub use office_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use office_core::kprint::{init as init_logging, set_flush_enabled};

/// Prelude for common imports
pub mod prelude {
    pub use office_core::{
        OfficeError, OfficeResult, Phase, PolicyKind, PriorityMonitor, Role, TierId, TierPolicy,
        VisitorId,
    };
    pub use office_sim::{Observer, SimConfig, Simulator};
}
