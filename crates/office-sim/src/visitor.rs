//! Visitor driver
//!
//! Each visitor runs on its own thread and walks its [`Lifecycle`] through
//! the monitor: queue, wait for admission, consult, leave. Researchers leave
//! once for a task and come back at the returning tier. Delays are taken
//! outside the monitor and are cut short when the simulation stops.

use std::sync::Arc;

use office_core::{
    kdebug, kerror, kinfo, CancellationToken, Departure, EventBus, EventKind, Lifecycle, OfficeError,
    OfficeResult, Phase, PriorityMonitor, TierPolicy, VisitorId, VisitorState,
};
use rand::Rng;

use crate::config::{DelayRange, SimConfig};

/// Everything a visitor thread shares with the rest of the simulation
#[derive(Clone)]
pub struct VisitContext {
    pub monitor: Arc<PriorityMonitor<VisitorId>>,
    pub policy: Arc<TierPolicy>,
    pub bus: Arc<EventBus>,
    pub config: Arc<SimConfig>,
    /// Cancelled on shutdown; only shortens delays
    pub stop: CancellationToken,
}

impl VisitContext {
    fn stay(&self, lifecycle: &Lifecycle) -> DelayRange {
        match (lifecycle.role().revisits(), lifecycle.phase()) {
            (true, Phase::New) => self.config.task_briefing,
            (true, Phase::Returning) => self.config.finalize,
            (false, _) => self.config.consult,
        }
    }

    fn pause<R: Rng + ?Sized>(&self, range: DelayRange, rng: &mut R) {
        self.stop.sleep(range.sample(rng, self.config.time_scale));
    }
}

/// Held office; released on drop if the visit unwinds before `leave`
struct Admission<'a> {
    monitor: &'a PriorityMonitor<VisitorId>,
    id: VisitorId,
    held: bool,
}

impl<'a> Admission<'a> {
    fn new(monitor: &'a PriorityMonitor<VisitorId>, id: VisitorId) -> Self {
        Self {
            monitor,
            id,
            held: true,
        }
    }

    fn leave(mut self) -> OfficeResult<()> {
        self.held = false;
        self.monitor.leave(&self.id)
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.held {
            kerror!("{} unwound while holding the office, releasing", self.id);
            let _ = self.monitor.leave(&self.id);
        }
    }
}

/// Drive one visitor from arrival to a terminal state
///
/// Returns `Departed` or `Abandoned` (patience ran out or the request was
/// cancelled). Contract violations are returned as errors and end the
/// visit at once.
pub fn run_visitor<R: Rng + ?Sized>(
    ctx: &VisitContext,
    id: VisitorId,
    rng: &mut R,
) -> OfficeResult<VisitorState> {
    let mut lifecycle = Lifecycle::new(id.role());
    ctx.bus.publish(EventKind::Arrived, id);

    loop {
        let tier = lifecycle.queue(&ctx.policy)?;
        kdebug!(
            "{} queued as {}",
            id,
            ctx.policy.tier_name(tier).unwrap_or("?")
        );

        let admitted = match ctx.config.patience {
            Some(patience) => ctx.monitor.enter_timeout(tier, id, patience),
            None => ctx.monitor.enter(tier, id),
        };
        match admitted {
            Ok(()) => {}
            Err(OfficeError::Timeout) | Err(OfficeError::Cancelled) => {
                lifecycle.abandon()?;
                ctx.bus.publish(EventKind::GaveUp, id);
                kinfo!("{} {} gave up waiting", id.role(), id);
                return Ok(lifecycle.state());
            }
            Err(e) => return Err(e),
        }
        let admission = Admission::new(&ctx.monitor, id);
        lifecycle.admitted()?;
        ctx.bus.publish(EventKind::Entered, id);

        ctx.pause(ctx.stay(&lifecycle), rng);

        admission.leave()?;
        match lifecycle.depart()? {
            Departure::Final => {
                ctx.bus.publish(EventKind::Left, id);
                return Ok(lifecycle.state());
            }
            Departure::ForTask => {
                ctx.bus.publish(EventKind::LeftForTask, id);
                ctx.pause(ctx.config.task, rng);
                ctx.bus.publish(EventKind::Reawoken, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use office_core::{PolicyKind, Role, TierId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::thread;
    use std::time::{Duration, Instant};

    fn context(config: SimConfig) -> VisitContext {
        let policy = Arc::new(config.policy.build());
        VisitContext {
            monitor: Arc::new(PriorityMonitor::for_policy(&policy)),
            policy,
            bus: Arc::new(EventBus::new(64)),
            config: Arc::new(config),
            stop: CancellationToken::new(),
        }
    }

    fn kinds(bus: &EventBus) -> Vec<EventKind> {
        bus.drain().map(|e| e.kind).collect()
    }

    #[test]
    fn test_student_single_visit() {
        let ctx = context(SimConfig::instant(PolicyKind::TwoTier));
        let mut rng = StdRng::seed_from_u64(1);
        let id = VisitorId::new(Role::Student, 1);

        assert_eq!(run_visitor(&ctx, id, &mut rng), Ok(VisitorState::Departed));
        assert_eq!(
            kinds(&ctx.bus),
            vec![EventKind::Arrived, EventKind::Entered, EventKind::Left]
        );
        assert_eq!(ctx.monitor.stats().admissions, vec![0, 1]);
    }

    #[test]
    fn test_researcher_two_visits() {
        let ctx = context(SimConfig::instant(PolicyKind::FourTier));
        let mut rng = StdRng::seed_from_u64(1);
        let id = VisitorId::new(Role::Researcher, 1);

        assert_eq!(run_visitor(&ctx, id, &mut rng), Ok(VisitorState::Departed));
        assert_eq!(
            kinds(&ctx.bus),
            vec![
                EventKind::Arrived,
                EventKind::Entered,
                EventKind::LeftForTask,
                EventKind::Reawoken,
                EventKind::Entered,
                EventKind::Left,
            ]
        );
        // One admission at the new tier, one at the returning tier
        assert_eq!(ctx.monitor.stats().admissions, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_unserved_role_is_contract_violation() {
        let ctx = context(SimConfig::instant(PolicyKind::TwoTier));
        let mut rng = StdRng::seed_from_u64(1);
        let id = VisitorId::new(Role::Researcher, 1);
        assert!(matches!(
            run_visitor(&ctx, id, &mut rng),
            Err(OfficeError::Contract(_))
        ));
    }

    #[test]
    fn test_impatient_visitor_gives_up() {
        let config = SimConfig::instant(PolicyKind::TwoTier).patience(Some(Duration::from_millis(30)));
        let ctx = context(config);
        let blocker = VisitorId::new(Role::Ta, 1);
        ctx.monitor.enter(TierId::new(0), blocker).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let id = VisitorId::new(Role::Student, 1);
        assert_eq!(run_visitor(&ctx, id, &mut rng), Ok(VisitorState::Abandoned));
        assert_eq!(kinds(&ctx.bus), vec![EventKind::Arrived, EventKind::GaveUp]);
        assert_eq!(ctx.monitor.snapshot().waiting(), 0);
        ctx.monitor.leave(&blocker).unwrap();
    }

    #[test]
    fn test_panic_inside_releases_office() {
        let ctx = context(SimConfig::instant(PolicyKind::TwoTier));
        let ta = VisitorId::new(Role::Ta, 1);
        let student = VisitorId::new(Role::Student, 1);

        let monitor = Arc::clone(&ctx.monitor);
        let holder = thread::spawn(move || {
            monitor.enter(TierId::new(0), ta).unwrap();
            let _admission = Admission::new(&monitor, ta);
            panic!("consult blew up");
        });
        assert!(holder.join().is_err());
        assert!(!ctx.monitor.snapshot().occupied);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(run_visitor(&ctx, student, &mut rng), Ok(VisitorState::Departed));
    }

    #[test]
    fn test_stop_cuts_delays_short() {
        let config = SimConfig::for_policy(PolicyKind::TwoTier)
            .consult(DelayRange::millis(60_000, 60_000));
        let ctx = context(config);
        let stopper = ctx.stop.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stopper.cancel();
        });

        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(1);
        let id = VisitorId::new(Role::Ta, 1);
        assert_eq!(run_visitor(&ctx, id, &mut rng), Ok(VisitorState::Departed));
        assert!(start.elapsed() < Duration::from_secs(10));
        canceller.join().unwrap();
    }
}
