//! Simulator: spawns visitor threads and runs the auto-arrival loop
//!
//! # Design
//!
//! The simulator owns the monitor, the policy and the event bus, and hands
//! clones of them to every visitor thread through a [`VisitContext`]. It
//! keeps the join handles so a run can be drained into a [`SimReport`].
//! Finished visitors are reaped as new ones arrive, so a long auto run
//! holds one outcome per visitor rather than one thread handle.
//!
//! Shutdown is two-staged: `stop_auto` ends arrivals, `shutdown` also
//! cancels the shared stop token so in-flight visitors skip their
//! remaining delays and finish quickly.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use office_core::{
    kdebug, kerror, kinfo, CancellationToken, ContractViolation, EventBus, EventKind,
    MonitorStats, OfficeError, OfficeResult, Phase, PriorityMonitor, Role, TierPolicy, VisitorId,
    VisitorState,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SimConfig;
use crate::visitor::{run_visitor, VisitContext};

type Outcome = (u64, VisitorId, OfficeResult<VisitorState>);

/// Visitor thread still to be joined; `seq` is its spawn order
struct Tracked {
    seq: u64,
    id: VisitorId,
    handle: JoinHandle<OfficeResult<VisitorState>>,
}

impl Tracked {
    fn join(self) -> Outcome {
        let outcome = self.handle.join().unwrap_or(Err(OfficeError::Panicked));
        (self.seq, self.id, outcome)
    }
}

/// Handle to a running auto-arrival loop
struct AutoLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Result of a finished (or drained) simulation
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Final state or error per visitor, in spawn order
    pub outcomes: Vec<(VisitorId, OfficeResult<VisitorState>)>,
    pub stats: MonitorStats,
    pub events_published: u64,
    pub events_dropped: u64,
}

impl SimReport {
    pub fn departed(&self) -> usize {
        self.count(|o| matches!(o, Ok(VisitorState::Departed)))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|o| matches!(o, Ok(VisitorState::Abandoned)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| o.is_err())
    }

    fn count(&self, f: impl Fn(&OfficeResult<VisitorState>) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// Spawns and tracks visitors for one office
pub struct Simulator {
    ctx: VisitContext,
    counters: [AtomicU32; 3],
    spawned: AtomicU64,
    visitors: Mutex<Vec<Tracked>>,
    finished: Mutex<Vec<Outcome>>,
    auto: Mutex<Option<AutoLoop>>,
}

impl Simulator {
    /// Validate `config` and build an idle simulator
    pub fn new(config: SimConfig) -> OfficeResult<Arc<Self>> {
        config.validate().map_err(OfficeError::Config)?;
        let policy = Arc::new(config.policy.build());
        let ctx = VisitContext {
            monitor: Arc::new(PriorityMonitor::for_policy(&policy)),
            policy,
            bus: Arc::new(EventBus::new(config.event_capacity)),
            config: Arc::new(config),
            stop: CancellationToken::new(),
        };
        kinfo!(
            "office open: {} policy, {} tiers",
            ctx.config.policy,
            ctx.policy.num_tiers()
        );
        Ok(Arc::new(Self {
            ctx,
            counters: Default::default(),
            spawned: AtomicU64::new(0),
            visitors: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            auto: Mutex::new(None),
        }))
    }

    pub fn monitor(&self) -> &Arc<PriorityMonitor<VisitorId>> {
        &self.ctx.monitor
    }

    pub fn policy(&self) -> &Arc<TierPolicy> {
        &self.ctx.policy
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.ctx.bus
    }

    pub fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    /// Spawn one visitor thread for `role`
    pub fn add_visitor(&self, role: Role) -> OfficeResult<VisitorId> {
        if !self.ctx.policy.serves(role) {
            return Err(ContractViolation::RoleNotServed(role, Phase::New).into());
        }
        let number = self.counters[role as usize].fetch_add(1, Ordering::Relaxed) + 1;
        let id = VisitorId::new(role, number);
        let seq = self.spawned.fetch_add(1, Ordering::Relaxed);
        let mut rng = self.rng_for(seq);

        let ctx = self.ctx.clone();
        let handle = thread::Builder::new()
            .name(format!("visitor-{}", id))
            .spawn(move || {
                let outcome = run_visitor(&ctx, id, &mut rng);
                if let Err(e) = &outcome {
                    kerror!("{} failed: {}", id, e);
                }
                outcome
            })
            .map_err(|e| OfficeError::Platform(e.raw_os_error().unwrap_or(0)))?;

        self.ctx.bus.publish(EventKind::Spawned, id);
        kdebug!("spawned {} {}", role, id);
        self.reap();
        lock(&self.visitors).push(Tracked { seq, id, handle });
        Ok(id)
    }

    /// Start the auto-arrival loop; false if it is already running
    pub fn start_auto(self: &Arc<Self>) -> OfficeResult<bool> {
        let mut auto = lock(&self.auto);
        if auto.is_some() {
            return Ok(false);
        }
        let sampler = self
            .ctx
            .config
            .mix
            .sampler(&self.ctx.policy)
            .ok_or(OfficeError::Config("role mix gives no weight to any served role"))?;

        let token = self.ctx.stop.child();
        let loop_token = token.clone();
        let sim = Arc::clone(self);
        let mut rng = self.rng_for_next();
        let handle = thread::Builder::new()
            .name("office-auto".into())
            .spawn(move || {
                kinfo!("auto arrivals started");
                while !loop_token.is_cancelled() {
                    let role = sampler.pick(&mut rng);
                    if let Err(e) = sim.add_visitor(role) {
                        kerror!("auto arrival failed: {}", e);
                        break;
                    }
                    let gap = sim.ctx.config.arrival_gap.sample(&mut rng, sim.ctx.config.time_scale);
                    loop_token.sleep(gap);
                }
                kinfo!("auto arrivals stopped");
            })
            .map_err(|e| OfficeError::Platform(e.raw_os_error().unwrap_or(0)))?;

        *auto = Some(AutoLoop { token, handle });
        Ok(true)
    }

    /// Stop the auto-arrival loop and wait for it to exit
    pub fn stop_auto(&self) {
        let auto = lock(&self.auto).take();
        if let Some(auto) = auto {
            auto.token.cancel();
            if auto.handle.join().is_err() {
                kerror!("auto-arrival thread panicked");
            }
        }
    }

    pub fn is_auto_running(&self) -> bool {
        lock(&self.auto).is_some()
    }

    /// Stop arrivals and cut all remaining visitor delays short
    pub fn shutdown(&self) {
        self.stop_auto();
        self.ctx.stop.cancel();
    }

    /// Number of visitor threads still running
    pub fn active_visitors(&self) -> usize {
        self.reap();
        lock(&self.visitors).len()
    }

    /// Join visitor threads that already finished; returns how many
    pub fn reap(&self) -> usize {
        let done: Vec<Tracked> = {
            let mut visitors = lock(&self.visitors);
            let (done, running) = std::mem::take(&mut *visitors)
                .into_iter()
                .partition(|v: &Tracked| v.handle.is_finished());
            *visitors = running;
            done
        };
        let reaped = done.len();
        if reaped > 0 {
            lock(&self.finished).extend(done.into_iter().map(Tracked::join));
        }
        reaped
    }

    /// Join every visitor spawned so far and summarize the run
    ///
    /// Blocks until those visitors finish; call `shutdown` first for a
    /// quick exit.
    pub fn join(&self) -> SimReport {
        let visitors = std::mem::take(&mut *lock(&self.visitors));
        let joined: Vec<Outcome> = visitors.into_iter().map(Tracked::join).collect();

        let mut all = std::mem::take(&mut *lock(&self.finished));
        all.extend(joined);
        all.sort_by_key(|(seq, _, _)| *seq);
        let outcomes = all.into_iter().map(|(_, id, outcome)| (id, outcome)).collect();

        SimReport {
            outcomes,
            stats: self.ctx.monitor.stats(),
            events_published: self.ctx.bus.published(),
            events_dropped: self.ctx.bus.dropped(),
        }
    }

    fn rng_for_next(&self) -> StdRng {
        self.rng_for(self.spawned.fetch_add(1, Ordering::Relaxed))
    }

    fn rng_for(&self, n: u64) -> StdRng {
        match self.ctx.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_entropy(),
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.ctx.stop.cancel();
    }
}

// Visitor bookkeeping never panics under the lock
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
