//! Visitor identifier type

use core::fmt;

use crate::tier::Role;

/// Identity of one real-world visitor
///
/// A revisiting actor keeps the same id for both of its requests; the two
/// requests never overlap in time, so the id stays unique per in-flight
/// admission attempt.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitorId {
    role: Role,
    number: u32,
}

impl VisitorId {
    #[inline]
    pub const fn new(role: Role, number: u32) -> Self {
        VisitorId { role, number }
    }

    #[inline]
    pub const fn role(self) -> Role {
        self.role
    }

    /// Per-role sequence number (starts at 1)
    #[inline]
    pub const fn number(self) -> u32 {
        self.number
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.role.prefix(), self.number)
    }
}

// Same as Display so queue dumps read like the office door list
impl fmt::Debug for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
