//! Tier policy: the static (role, phase) -> tier mapping
//!
//! Rank 0 is the highest priority. The policy is built once, validated,
//! and shared read-only between the monitor owner and visitor drivers.
//! Deployments differ only in the table handed to [`TierPolicy::new`].
//!
//! | Policy   | Tiers (rank 0 first)                                      |
//! |----------|-----------------------------------------------------------|
//! | 2-tier   | TA, Student                                               |
//! | 4-tier   | Returning Researcher, New Researcher, TA, Student         |

use core::fmt;
use core::str::FromStr;
use std::collections::VecDeque;

use crate::error::{ContractViolation, OfficeResult};

/// Most tiers a policy or monitor may have; ranks fit in a `u8`
pub const MAX_TIERS: usize = u8::MAX as usize + 1;

/// Rank of a priority tier (0 = highest priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TierId(u8);

impl TierId {
    #[inline]
    pub const fn new(rank: u8) -> Self {
        TierId(rank)
    }

    #[inline]
    pub const fn rank(self) -> u8 {
        self.0
    }

    /// Get as usize for indexing into per-tier queues
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Check if this tier strictly outranks `other`
    #[inline]
    pub const fn outranks(self, other: TierId) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is knocking on the door
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    Researcher = 0,
    Ta = 1,
    Student = 2,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Researcher, Role::Ta, Role::Student];

    /// Short prefix used in visitor names (`R-01`, `TA-01`, `S-01`)
    pub const fn prefix(self) -> &'static str {
        match self {
            Role::Researcher => "R",
            Role::Ta => "TA",
            Role::Student => "S",
        }
    }

    /// Whether this role leaves for a task and comes back once
    pub const fn revisits(self) -> bool {
        matches!(self, Role::Researcher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Researcher => "Researcher",
            Role::Ta => "TA",
            Role::Student => "Student",
        })
    }
}

/// Which visit this is for the actor
///
/// Single-visit roles only ever use `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    New,
    Returning,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::New => "new",
            Phase::Returning => "returning",
        })
    }
}

/// One priority class and the (role, phase) pairs it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub name: &'static str,
    pub members: Vec<(Role, Phase)>,
}

impl Tier {
    pub fn new(name: &'static str, members: &[(Role, Phase)]) -> Self {
        Self {
            name,
            members: members.to_vec(),
        }
    }
}

/// Built-in deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// TA over Student
    TwoTier,
    /// Returning Researcher > New Researcher > TA > Student
    FourTier,
}

impl PolicyKind {
    pub fn build(self) -> TierPolicy {
        match self {
            PolicyKind::TwoTier => TierPolicy::two_tier(),
            PolicyKind::FourTier => TierPolicy::four_tier(),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "2" | "two" | "2-tier" | "two-tier" => Ok(PolicyKind::TwoTier),
            "4" | "four" | "4-tier" | "four-tier" => Ok(PolicyKind::FourTier),
            _ => Err("unknown policy (expected 2-tier or 4-tier)"),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::TwoTier => "2-tier",
            PolicyKind::FourTier => "4-tier",
        })
    }
}

/// Validated, immutable tier table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPolicy {
    tiers: Vec<Tier>,
}

impl TierPolicy {
    /// Build a policy from tiers listed highest priority first
    ///
    /// Rejects an empty table, a (role, phase) mapped twice, and a
    /// revisiting role whose returning tier does not outrank its new tier.
    pub fn new(tiers: Vec<Tier>) -> OfficeResult<Self> {
        if tiers.is_empty() {
            return Err(ContractViolation::NoTiers.into());
        }
        if tiers.len() > MAX_TIERS {
            return Err(ContractViolation::TooManyTiers(tiers.len()).into());
        }

        let mut seen: Vec<(Role, Phase)> = Vec::new();
        for tier in &tiers {
            for &member in &tier.members {
                if seen.contains(&member) {
                    return Err(ContractViolation::DuplicateMapping(member.0, member.1).into());
                }
                seen.push(member);
            }
        }

        let policy = Self { tiers };
        for role in Role::ALL.into_iter().filter(|r| r.revisits()) {
            if let Some(new_tier) = policy.lookup(role, Phase::New) {
                match policy.lookup(role, Phase::Returning) {
                    Some(ret) if ret.outranks(new_tier) => {}
                    _ => return Err(ContractViolation::ElevationNotHigher(role).into()),
                }
            }
        }
        Ok(policy)
    }

    /// TA over Student
    pub fn two_tier() -> Self {
        Self {
            tiers: vec![
                Tier::new("TA", &[(Role::Ta, Phase::New)]),
                Tier::new("Student", &[(Role::Student, Phase::New)]),
            ],
        }
    }

    /// Returning Researcher > New Researcher > TA > Student
    pub fn four_tier() -> Self {
        Self {
            tiers: vec![
                Tier::new("Returning Researcher", &[(Role::Researcher, Phase::Returning)]),
                Tier::new("New Researcher", &[(Role::Researcher, Phase::New)]),
                Tier::new("TA", &[(Role::Ta, Phase::New)]),
                Tier::new("Student", &[(Role::Student, Phase::New)]),
            ],
        }
    }

    #[inline]
    pub fn num_tiers(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier_name(&self, tier: TierId) -> Option<&'static str> {
        self.tiers.get(tier.as_usize()).map(|t| t.name)
    }

    /// Tiers highest priority first
    pub fn tiers(&self) -> impl Iterator<Item = (TierId, &Tier)> {
        self.tiers
            .iter()
            .enumerate()
            .map(|(i, t)| (TierId::new(i as u8), t))
    }

    /// Resolve the tier for a role in a given phase
    pub fn tier_for(&self, role: Role, phase: Phase) -> OfficeResult<TierId> {
        self.lookup(role, phase)
            .ok_or_else(|| ContractViolation::RoleNotServed(role, phase).into())
    }

    /// Whether a first visit by `role` has a tier
    pub fn serves(&self, role: Role) -> bool {
        self.lookup(role, Phase::New).is_some()
    }

    fn lookup(&self, role: Role, phase: Phase) -> Option<TierId> {
        self.tiers
            .iter()
            .position(|t| t.members.contains(&(role, phase)))
            .map(|i| TierId::new(i as u8))
    }
}

/// The lowest-rank tier with a non-empty queue
#[inline]
pub fn active_tier<Id>(queues: &[VecDeque<Id>]) -> Option<TierId> {
    queues
        .iter()
        .position(|q| !q.is_empty())
        .map(|i| TierId::new(i as u8))
}

/// Admission predicate
///
/// `id` may enter iff the office is free, `tier` is the active tier and
/// `id` heads that tier's queue. A waiter in a higher-priority tier blocks
/// every lower tier no matter how long the lower waiter has queued.
#[inline]
pub fn admissible<Id: PartialEq>(
    occupied: bool,
    queues: &[VecDeque<Id>],
    tier: TierId,
    id: &Id,
) -> bool {
    !occupied
        && active_tier(queues) == Some(tier)
        && queues[tier.as_usize()].front() == Some(id)
}
