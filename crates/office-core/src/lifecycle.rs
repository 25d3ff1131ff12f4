//! Visitor lifecycle state machine
//!
//! ```text
//! Arrived -> Queued(t) -> Holding(t) -> Departed
//!                              |
//!                              +-> DepartedForTask -> Queued(t') -> Holding(t') -> Departed
//! ```
//!
//! Only revisiting roles take the task branch, exactly once. The returning
//! tier `t'` comes from the policy's `Returning` phase, so the monitor
//! itself never learns about phases.

use crate::error::{OfficeError, OfficeResult};
use crate::tier::{Phase, Role, TierId, TierPolicy};

/// Where a visitor is in its visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitorState {
    /// At the door, not yet queued
    Arrived,

    /// Waiting in the given tier
    Queued(TierId),

    /// Holding the office, admitted from the given tier
    Holding(TierId),

    /// Out doing the task, will come back
    DepartedForTask,

    /// Done for good
    Departed,

    /// Gave up waiting (timeout or cancellation)
    Abandoned,
}

impl VisitorState {
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, VisitorState::Departed | VisitorState::Abandoned)
    }
}

/// What a `leave` meant for the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Visit is over
    Final,
    /// Leaving to do a task, a returning visit follows
    ForTask,
}

/// Per-actor lifecycle driven by the visitor thread
#[derive(Debug, Clone)]
pub struct Lifecycle {
    role: Role,
    phase: Phase,
    state: VisitorState,
}

impl Lifecycle {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            phase: Phase::New,
            state: VisitorState::Arrived,
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn state(&self) -> VisitorState {
        self.state
    }

    /// Resolve the tier for the current phase and move to `Queued`
    pub fn queue(&mut self, policy: &TierPolicy) -> OfficeResult<TierId> {
        match self.state {
            VisitorState::Arrived | VisitorState::DepartedForTask => {
                let tier = policy.tier_for(self.role, self.phase)?;
                self.state = VisitorState::Queued(tier);
                Ok(tier)
            }
            from => Err(OfficeError::InvalidTransition { from, action: "queue" }),
        }
    }

    /// Record admission by the monitor
    pub fn admitted(&mut self) -> OfficeResult<()> {
        match self.state {
            VisitorState::Queued(tier) => {
                self.state = VisitorState::Holding(tier);
                Ok(())
            }
            from => Err(OfficeError::InvalidTransition { from, action: "admit" }),
        }
    }

    /// Record a `leave`
    ///
    /// A revisiting role on its first visit is elevated to `Returning`;
    /// the elevation never reverts.
    pub fn depart(&mut self) -> OfficeResult<Departure> {
        match self.state {
            VisitorState::Holding(_) if self.role.revisits() && self.phase == Phase::New => {
                self.phase = Phase::Returning;
                self.state = VisitorState::DepartedForTask;
                Ok(Departure::ForTask)
            }
            VisitorState::Holding(_) => {
                self.state = VisitorState::Departed;
                Ok(Departure::Final)
            }
            from => Err(OfficeError::InvalidTransition { from, action: "depart" }),
        }
    }

    /// Record giving up while queued
    pub fn abandon(&mut self) -> OfficeResult<()> {
        match self.state {
            VisitorState::Queued(_) => {
                self.state = VisitorState::Abandoned;
                Ok(())
            }
            from => Err(OfficeError::InvalidTransition { from, action: "abandon" }),
        }
    }
}
