//! Priority monitor guarding the single-occupant office
//!
//! One mutex protects the whole state (occupancy plus one FIFO queue per
//! tier) and one condition variable carries every wakeup. Waiters follow
//! Mesa semantics: a wake is only a hint, the admission predicate is
//! re-evaluated under the lock every time.
//!
//! # Example
//!
//! ```ignore
//! let policy = TierPolicy::two_tier();
//! let monitor = Arc::new(PriorityMonitor::for_policy(&policy));
//!
//! // In a visitor thread:
//! let tier = policy.tier_for(Role::Ta, Phase::New)?;
//! monitor.enter(tier, id)?;   // blocks until admitted
//! // ... consult ...
//! monitor.leave(&id)?;
//! ```

use core::fmt;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ContractViolation, OfficeError, OfficeResult};
use crate::tier::{self, TierId, TierPolicy, MAX_TIERS};
use crate::{kdebug, kerror, ktrace};

/// The request currently holding the office
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant<Id> {
    pub tier: TierId,
    pub id: Id,
}

/// Lock-consistent copy of the monitor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancySnapshot<Id> {
    pub occupied: bool,
    pub occupant: Option<Occupant<Id>>,
    /// Waiting ids per tier, rank 0 first, queue head first
    pub queues: Vec<Vec<Id>>,
}

impl<Id: PartialEq> OccupancySnapshot<Id> {
    /// Waiting ids of one tier (empty for an unknown tier)
    pub fn queue(&self, tier: TierId) -> &[Id] {
        self.queues
            .get(tier.as_usize())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of waiters across all tiers
    pub fn waiting(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    pub fn is_queued(&self, id: &Id) -> bool {
        self.queues.iter().any(|q| q.contains(id))
    }

    pub fn is_occupant(&self, id: &Id) -> bool {
        self.occupant.as_ref().map_or(false, |o| &o.id == id)
    }

    /// The lowest-rank tier with a waiter
    pub fn active_tier(&self) -> Option<TierId> {
        self.queues
            .iter()
            .position(|q| !q.is_empty())
            .map(|i| TierId::new(i as u8))
    }
}

/// Counters kept under the monitor lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Admissions per tier
    pub admissions: Vec<u64>,
    /// Condition variable wakeups observed by waiters
    pub wakeups: u64,
    /// Wakeups after which the waiter had to block again
    pub failed_rechecks: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    /// Deepest queue seen per tier
    pub max_depth: Vec<usize>,
}

impl MonitorStats {
    fn new(num_tiers: usize) -> Self {
        Self {
            admissions: vec![0; num_tiers],
            max_depth: vec![0; num_tiers],
            ..Self::default()
        }
    }

    pub fn total_admissions(&self) -> u64 {
        self.admissions.iter().sum()
    }
}

struct MonitorState<Id> {
    occupied: bool,
    occupant: Option<Occupant<Id>>,
    queues: Vec<VecDeque<Id>>,
    /// Queued ids asked to give up at their next recheck
    cancel_requests: Vec<Id>,
    stats: MonitorStats,
}

impl<Id: PartialEq> MonitorState<Id> {
    /// Id is queued anywhere or is the occupant
    fn holds(&self, id: &Id) -> bool {
        self.occupant.as_ref().map_or(false, |o| &o.id == id)
            || self.queues.iter().any(|q| q.contains(id))
    }

    /// Remove `id` from its queue, wherever it sits
    fn withdraw(&mut self, tier: TierId, id: &Id) {
        let queue = &mut self.queues[tier.as_usize()];
        if let Some(pos) = queue.iter().position(|q| q == id) {
            queue.remove(pos);
        }
    }
}

/// Strict multi-tier priority monitor
///
/// At most one request holds the office. Admission goes to the head of the
/// active tier (the lowest rank with any waiter); within a tier it is FIFO.
/// Lower tiers may starve under sustained higher-tier arrivals.
pub struct PriorityMonitor<Id> {
    num_tiers: usize,
    state: Mutex<MonitorState<Id>>,
    cond: Condvar,
}

impl<Id> PriorityMonitor<Id>
where
    Id: Clone + PartialEq + fmt::Debug,
{
    /// Create a monitor with `num_tiers` empty queues
    pub fn new(num_tiers: usize) -> OfficeResult<Self> {
        if num_tiers == 0 {
            kerror!("monitor constructed with zero tiers");
            return Err(ContractViolation::NoTiers.into());
        }
        if num_tiers > MAX_TIERS {
            kerror!("monitor constructed with {} tiers", num_tiers);
            return Err(ContractViolation::TooManyTiers(num_tiers).into());
        }
        Ok(Self::with_tiers(num_tiers))
    }

    /// Create a monitor sized for a validated policy
    pub fn for_policy(policy: &TierPolicy) -> Self {
        Self::with_tiers(policy.num_tiers())
    }

    fn with_tiers(num_tiers: usize) -> Self {
        Self {
            num_tiers,
            state: Mutex::new(MonitorState {
                occupied: false,
                occupant: None,
                queues: (0..num_tiers).map(|_| VecDeque::new()).collect(),
                cancel_requests: Vec::new(),
                stats: MonitorStats::new(num_tiers),
            }),
            cond: Condvar::new(),
        }
    }

    #[inline]
    pub fn num_tiers(&self) -> usize {
        self.num_tiers
    }

    /// Queue `id` in `tier` and block until admitted
    pub fn enter(&self, tier: TierId, id: Id) -> OfficeResult<()> {
        self.enter_until(tier, id, None)
    }

    /// Like [`enter`](Self::enter) but give up after `timeout`
    ///
    /// On `Err(Timeout)` the id has been removed from its queue. A
    /// timeout too large to express as a deadline waits without one.
    pub fn enter_timeout(&self, tier: TierId, id: Id, timeout: Duration) -> OfficeResult<()> {
        self.enter_until(tier, id, Instant::now().checked_add(timeout))
    }

    /// Ask a queued request to give up
    ///
    /// The waiter notices on its next recheck, removes itself and returns
    /// `Err(Cancelled)`. Returns false if `id` is not queued.
    pub fn cancel(&self, id: &Id) -> bool {
        let mut state = self.lock();
        if !state.queues.iter().any(|q| q.contains(id)) {
            return false;
        }
        if !state.cancel_requests.contains(id) {
            state.cancel_requests.push(id.clone());
        }
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Release the office
    ///
    /// Fails without touching any state if the office is empty or `id` is
    /// not the occupant. Wakes every waiter so each tier re-evaluates.
    pub fn leave(&self, id: &Id) -> OfficeResult<()> {
        let mut state = self.lock();
        match &state.occupant {
            None => {
                kerror!("{:?} left an empty office", id);
                return Err(ContractViolation::NotOccupied.into());
            }
            Some(occupant) if &occupant.id != id => {
                kerror!("{:?} left but {:?} holds the office", id, occupant.id);
                return Err(ContractViolation::NotOccupant.into());
            }
            Some(_) => {}
        }
        state.occupied = false;
        state.occupant = None;
        drop(state);

        kdebug!("{:?} left the office", id);
        self.cond.notify_all();
        Ok(())
    }

    /// Copy occupancy and all queues under the lock
    pub fn snapshot(&self) -> OccupancySnapshot<Id> {
        let state = self.lock();
        OccupancySnapshot {
            occupied: state.occupied,
            occupant: state.occupant.clone(),
            queues: state
                .queues
                .iter()
                .map(|q| q.iter().cloned().collect())
                .collect(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        self.lock().stats.clone()
    }

    // Critical sections never panic, so a poisoned lock still guards
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, MonitorState<Id>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter_until(&self, tier: TierId, id: Id, deadline: Option<Instant>) -> OfficeResult<()> {
        if tier.as_usize() >= self.num_tiers {
            kerror!("{:?} asked for tier {} of {}", id, tier, self.num_tiers);
            return Err(ContractViolation::UnknownTier {
                tier,
                num_tiers: self.num_tiers,
            }
            .into());
        }
        let t = tier.as_usize();

        let mut state = self.lock();
        if state.holds(&id) {
            kerror!("{:?} entered twice", id);
            return Err(ContractViolation::DuplicateRequest.into());
        }
        state.queues[t].push_back(id.clone());
        let depth = state.queues[t].len();
        if depth > state.stats.max_depth[t] {
            state.stats.max_depth[t] = depth;
        }
        ktrace!("{:?} queued at tier {} (depth {})", id, tier, depth);

        let mut woken = false;
        loop {
            if let Some(pos) = state.cancel_requests.iter().position(|c| c == &id) {
                state.cancel_requests.swap_remove(pos);
                state.withdraw(tier, &id);
                state.stats.cancelled += 1;
                drop(state);
                kdebug!("{:?} cancelled while queued at tier {}", id, tier);
                // Removing a head may hand the office to another tier
                self.cond.notify_all();
                return Err(OfficeError::Cancelled);
            }

            if tier::admissible(state.occupied, &state.queues, tier, &id) {
                state.queues[t].pop_front();
                state.occupied = true;
                state.occupant = Some(Occupant {
                    tier,
                    id: id.clone(),
                });
                state.stats.admissions[t] += 1;
                kdebug!("{:?} admitted at tier {}", id, tier);
                return Ok(());
            }

            if woken {
                state.stats.failed_rechecks += 1;
            }

            state = match deadline {
                None => self.cond.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.withdraw(tier, &id);
                        state.stats.timed_out += 1;
                        drop(state);
                        kdebug!("{:?} timed out at tier {}", id, tier);
                        self.cond.notify_all();
                        return Err(OfficeError::Timeout);
                    }
                    self.cond
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
            woken = true;
            state.stats.wakeups += 1;
            ktrace!("{:?} woke, rechecking", id);
        }
    }
}

impl<Id> fmt::Debug for PriorityMonitor<Id>
where
    Id: Clone + PartialEq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("PriorityMonitor")
            .field("occupant", &snap.occupant)
            .field("queues", &snap.queues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn t(rank: u8) -> TierId {
        TierId::new(rank)
    }

    /// Poll until `id` shows up in some queue
    fn wait_queued<Id: Clone + PartialEq + fmt::Debug>(m: &PriorityMonitor<Id>, id: &Id) {
        let start = Instant::now();
        while !m.snapshot().is_queued(id) {
            assert!(start.elapsed() < Duration::from_secs(5), "{:?} never queued", id);
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Visitor that records its admission then leaves at once
    ///
    /// Returns only after the visitor is visibly queued (or already through).
    fn visit(
        m: &Arc<PriorityMonitor<&'static str>>,
        log: &Log,
        tier: u8,
        id: &'static str,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(m);
        let log = Arc::clone(log);
        let handle = thread::spawn(move || {
            monitor.enter(t(tier), id).unwrap();
            log.lock().unwrap().push(id);
            monitor.leave(&id).unwrap();
        });
        wait_queued(m, &id);
        handle
    }

    fn join_all(handles: Vec<JoinHandle<()>>) {
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_enter_leave_basic() {
        let m = PriorityMonitor::new(2).unwrap();
        m.enter(t(1), "S-01").unwrap();

        let snap = m.snapshot();
        assert!(snap.occupied);
        assert_eq!(snap.occupant, Some(Occupant { tier: t(1), id: "S-01" }));
        assert_eq!(snap.waiting(), 0);

        m.leave(&"S-01").unwrap();
        let snap = m.snapshot();
        assert!(!snap.occupied);
        assert_eq!(snap.occupant, None);
    }

    #[test]
    fn test_zero_tiers_rejected() {
        assert!(matches!(
            PriorityMonitor::<u32>::new(0),
            Err(OfficeError::Contract(ContractViolation::NoTiers))
        ));
    }

    #[test]
    fn test_too_many_tiers_rejected() {
        assert!(matches!(
            PriorityMonitor::<u32>::new(300),
            Err(OfficeError::Contract(ContractViolation::TooManyTiers(300)))
        ));
        assert!(PriorityMonitor::<u32>::new(MAX_TIERS).is_ok());
    }

    #[test]
    fn test_unknown_tier_rejected() {
        let m = PriorityMonitor::new(2).unwrap();
        assert_eq!(
            m.enter(t(2), 1u32),
            Err(OfficeError::Contract(ContractViolation::UnknownTier {
                tier: t(2),
                num_tiers: 2
            }))
        );
        assert_eq!(m.snapshot().waiting(), 0);
    }

    #[test]
    fn test_ta_admitted_before_earlier_student() {
        let m = Arc::new(PriorityMonitor::for_policy(&TierPolicy::two_tier()));
        let log: Log = Arc::default();

        // Someone holds the office while both queue up
        m.enter(t(1), "S-00").unwrap();
        let s01 = visit(&m, &log, 1, "S-01");
        let ta01 = visit(&m, &log, 0, "TA-01");

        let snap = m.snapshot();
        assert_eq!(snap.queue(t(0)), &["TA-01"]);
        assert_eq!(snap.queue(t(1)), &["S-01"]);
        assert_eq!(snap.active_tier(), Some(t(0)));

        m.leave(&"S-00").unwrap();
        join_all(vec![s01, ta01]);
        assert_eq!(*log.lock().unwrap(), vec!["TA-01", "S-01"]);
    }

    #[test]
    fn test_returning_researcher_elevated() {
        let policy = TierPolicy::four_tier();
        let m = Arc::new(PriorityMonitor::for_policy(&policy));
        let log: Log = Arc::default();

        // R-01 first visit, then off to the task
        m.enter(t(1), "R-01").unwrap();
        m.leave(&"R-01").unwrap();

        m.enter(t(2), "TA-00").unwrap();
        let mut handles = vec![
            visit(&m, &log, 1, "R-02"),
            visit(&m, &log, 3, "S-01"),
            visit(&m, &log, 2, "TA-01"),
        ];
        // Back from the task, later than everyone else
        handles.push(visit(&m, &log, 0, "R-01"));

        m.leave(&"TA-00").unwrap();
        join_all(handles);
        assert_eq!(*log.lock().unwrap(), vec!["R-01", "R-02", "TA-01", "S-01"]);
    }

    #[test]
    fn test_fifo_within_tier() {
        let m = Arc::new(PriorityMonitor::for_policy(&TierPolicy::two_tier()));
        let log: Log = Arc::default();

        m.enter(t(1), "S-01").unwrap();
        let a = visit(&m, &log, 0, "TA-01");
        let b = visit(&m, &log, 0, "TA-02");
        let c = visit(&m, &log, 0, "TA-03");
        assert_eq!(m.snapshot().queue(t(0)), &["TA-01", "TA-02", "TA-03"]);

        m.leave(&"S-01").unwrap();
        join_all(vec![a, b, c]);
        assert_eq!(*log.lock().unwrap(), vec!["TA-01", "TA-02", "TA-03"]);
    }

    #[test]
    fn test_leave_contract_violations() {
        let m = PriorityMonitor::new(2).unwrap();
        assert_eq!(
            m.leave(&"S-01"),
            Err(OfficeError::Contract(ContractViolation::NotOccupied))
        );
        assert!(!m.snapshot().occupied);

        m.enter(t(0), "TA-01").unwrap();
        assert_eq!(
            m.leave(&"S-01"),
            Err(OfficeError::Contract(ContractViolation::NotOccupant))
        );

        // State untouched by the failed leave
        let snap = m.snapshot();
        assert!(snap.occupied);
        assert_eq!(snap.occupant, Some(Occupant { tier: t(0), id: "TA-01" }));
        m.leave(&"TA-01").unwrap();
    }

    #[test]
    fn test_duplicate_request_rejected() {
        let m = Arc::new(PriorityMonitor::new(2).unwrap());
        m.enter(t(0), "TA-01").unwrap();

        // Occupant may not queue again
        assert_eq!(
            m.enter(t(1), "TA-01"),
            Err(OfficeError::Contract(ContractViolation::DuplicateRequest))
        );

        // Nor may a queued id
        let log: Log = Arc::default();
        let waiter = visit(&m, &log, 1, "S-01");
        assert_eq!(
            m.enter(t(1), "S-01"),
            Err(OfficeError::Contract(ContractViolation::DuplicateRequest))
        );
        assert_eq!(m.snapshot().queue(t(1)), &["S-01"]);

        m.leave(&"TA-01").unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_timeout_removes_interior_waiter() {
        let m = Arc::new(PriorityMonitor::new(2).unwrap());
        let log: Log = Arc::default();
        m.enter(t(0), "TA-01").unwrap();

        let s1 = visit(&m, &log, 1, "S-01");
        let m2 = Arc::clone(&m);
        let s2 = thread::spawn(move || m2.enter_timeout(t(1), "S-02", Duration::from_millis(200)));
        wait_queued(&m, &"S-02");
        let s3 = visit(&m, &log, 1, "S-03");

        assert_eq!(s2.join().unwrap(), Err(OfficeError::Timeout));
        assert_eq!(m.snapshot().queue(t(1)), &["S-01", "S-03"]);

        m.leave(&"TA-01").unwrap();
        join_all(vec![s1, s3]);
        assert_eq!(*log.lock().unwrap(), vec!["S-01", "S-03"]);
        assert_eq!(m.stats().timed_out, 1);
    }

    #[test]
    fn test_timeout_admitted_in_time() {
        let m = PriorityMonitor::new(1).unwrap();
        m.enter_timeout(t(0), 7u32, Duration::from_millis(10)).unwrap();
        assert!(m.snapshot().is_occupant(&7));
        m.leave(&7).unwrap();
    }

    #[test]
    fn test_unbounded_timeout_waits_untimed() {
        let m = Arc::new(PriorityMonitor::new(1).unwrap());
        m.enter_timeout(t(0), 1u32, Duration::MAX).unwrap();

        let m2 = Arc::clone(&m);
        let waiter = thread::spawn(move || m2.enter_timeout(t(0), 2u32, Duration::MAX));
        wait_queued(&m, &2u32);
        assert!(m.cancel(&2u32));
        assert_eq!(waiter.join().unwrap(), Err(OfficeError::Cancelled));

        m.leave(&1u32).unwrap();
        assert_eq!(m.stats().timed_out, 0);
    }

    #[test]
    fn test_cancel_head_hands_over() {
        let m = Arc::new(PriorityMonitor::new(2).unwrap());
        let log: Log = Arc::default();
        m.enter(t(1), "S-00").unwrap();

        let m2 = Arc::clone(&m);
        let ta = thread::spawn(move || m2.enter(t(0), "TA-01"));
        wait_queued(&m, &"TA-01");
        let s1 = visit(&m, &log, 1, "S-01");

        assert!(m.cancel(&"TA-01"));
        assert_eq!(ta.join().unwrap(), Err(OfficeError::Cancelled));
        assert!(!m.snapshot().is_queued(&"TA-01"));

        m.leave(&"S-00").unwrap();
        s1.join().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["S-01"]);
        assert_eq!(m.stats().cancelled, 1);
    }

    #[test]
    fn test_cancel_unknown_id() {
        let m = PriorityMonitor::new(1).unwrap();
        assert!(!m.cancel(&1u32));
        m.enter(t(0), 1u32).unwrap();
        // Occupant is not queued
        assert!(!m.cancel(&1u32));
        m.leave(&1u32).unwrap();
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 50;

        let m = Arc::new(PriorityMonitor::new(4).unwrap());
        let inside = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));

        let observer = {
            let m = Arc::clone(&m);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let snap = m.snapshot();
                    assert_eq!(snap.occupied, snap.occupant.is_some());
                    thread::yield_now();
                }
            })
        };

        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let m = Arc::clone(&m);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        let tier = t(((worker + round) % 4) as u8);
                        m.enter(tier, (worker, round)).unwrap();
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        thread::yield_now();
                        inside.store(false, Ordering::SeqCst);
                        m.leave(&(worker, round)).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        done.store(true, Ordering::Release);
        observer.join().unwrap();

        let stats = m.stats();
        assert_eq!(stats.total_admissions(), (THREADS * ROUNDS) as u64);
        assert_eq!(m.snapshot().waiting(), 0);
    }

    #[test]
    fn test_stats_track_depth_and_admissions() {
        let m = Arc::new(PriorityMonitor::new(2).unwrap());
        let log: Log = Arc::default();
        m.enter(t(0), "TA-01").unwrap();
        let a = visit(&m, &log, 1, "S-01");
        let b = visit(&m, &log, 1, "S-02");
        m.leave(&"TA-01").unwrap();
        join_all(vec![a, b]);

        let stats = m.stats();
        assert_eq!(stats.admissions, vec![1, 2]);
        assert_eq!(stats.max_depth, vec![1, 2]);
        assert!(stats.wakeups >= 2);
    }
}
