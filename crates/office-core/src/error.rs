//! Error types for the office scheduler

use core::fmt;

use crate::lifecycle::VisitorState;
use crate::tier::{Phase, Role, TierId};

/// Result type for office operations
pub type OfficeResult<T> = Result<T, OfficeError>;

/// Errors that can occur in office operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficeError {
    /// Caller broke the monitor or policy contract (a driver logic defect)
    Contract(ContractViolation),

    /// Lifecycle step not allowed from the current state
    InvalidTransition {
        from: VisitorState,
        action: &'static str,
    },

    /// Queued request was cancelled before admission
    Cancelled,

    /// Queued request was not admitted before its deadline
    Timeout,

    /// Simulation configuration rejected by `validate`
    Config(&'static str),

    /// Visitor thread panicked
    Panicked,

    /// Platform-specific error (errno)
    Platform(i32),
}

impl fmt::Display for OfficeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfficeError::Contract(v) => write!(f, "contract violation: {}", v),
            OfficeError::InvalidTransition { from, action } => {
                write!(f, "cannot {} from state {:?}", action, from)
            }
            OfficeError::Cancelled => write!(f, "request cancelled"),
            OfficeError::Timeout => write!(f, "request timed out"),
            OfficeError::Config(msg) => write!(f, "invalid config: {}", msg),
            OfficeError::Panicked => write!(f, "visitor thread panicked"),
            OfficeError::Platform(code) => write!(f, "platform error: {}", code),
        }
    }
}

impl std::error::Error for OfficeError {}

/// Contract violations: fatal to the caller, never retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// Monitor or policy constructed with zero tiers
    NoTiers,

    /// More tiers than a `TierId` can rank
    TooManyTiers(usize),

    /// Tier rank outside the monitor's configured range
    UnknownTier { tier: TierId, num_tiers: usize },

    /// Id is already queued or already holds the office
    DuplicateRequest,

    /// `leave` while the office is empty
    NotOccupied,

    /// `leave` by someone other than the occupant
    NotOccupant,

    /// Policy has no tier for this role and phase
    RoleNotServed(Role, Phase),

    /// Role and phase mapped to more than one tier
    DuplicateMapping(Role, Phase),

    /// Returning tier does not outrank the new tier for a revisiting role
    ElevationNotHigher(Role),
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::NoTiers => write!(f, "at least one tier is required"),
            ContractViolation::TooManyTiers(n) => {
                write!(f, "{} tiers requested, at most 256 are supported", n)
            }
            ContractViolation::UnknownTier { tier, num_tiers } => {
                write!(f, "tier {} out of range (monitor has {} tiers)", tier, num_tiers)
            }
            ContractViolation::DuplicateRequest => {
                write!(f, "id already queued or holding the office")
            }
            ContractViolation::NotOccupied => write!(f, "leave called on an empty office"),
            ContractViolation::NotOccupant => write!(f, "leave called by a non-occupant"),
            ContractViolation::RoleNotServed(role, phase) => {
                write!(f, "no tier serves {} ({})", role, phase)
            }
            ContractViolation::DuplicateMapping(role, phase) => {
                write!(f, "{} ({}) mapped to more than one tier", role, phase)
            }
            ContractViolation::ElevationNotHigher(role) => {
                write!(f, "returning tier for {} must outrank its new tier", role)
            }
        }
    }
}

impl From<ContractViolation> for OfficeError {
    fn from(v: ContractViolation) -> Self {
        OfficeError::Contract(v)
    }
}
