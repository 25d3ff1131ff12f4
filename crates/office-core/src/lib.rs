//! # office-core
//!
//! Core types for the office scheduler: a single-occupant resource
//! guarded by a strict multi-tier priority monitor.
//!
//! This crate is platform-agnostic and spawns no threads of its own.
//! Visitor threads, the auto-arrival loop and the observer live in
//! `office-sim`.
//!
//! ## Modules
//!
//! - `monitor` - The priority monitor (`enter` / `leave` / `snapshot`)
//! - `tier` - Tier ranks, roles, phases and the tier policy table
//! - `lifecycle` - Per-visitor state machine, including the returning visit
//! - `id` - Visitor identifier type
//! - `event` - Best-effort event feed from visitors to the observer
//! - `cancel` - Cancellation token for simulation shutdown
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod tier;
pub mod monitor;
pub mod lifecycle;
pub mod event;
pub mod cancel;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::VisitorId;
pub use tier::{PolicyKind, Phase, Role, Tier, TierId, TierPolicy, MAX_TIERS};
pub use monitor::{MonitorStats, OccupancySnapshot, Occupant, PriorityMonitor};
pub use lifecycle::{Departure, Lifecycle, VisitorState};
pub use event::{EventBus, EventKind, VisitorEvent};
pub use cancel::CancellationToken;
pub use error::{ContractViolation, OfficeError, OfficeResult};
pub use kprint::{set_log_level, LogLevel};
pub use env::{env_get, env_get_bool, env_get_millis, env_get_opt, env_get_str, env_is_set};
