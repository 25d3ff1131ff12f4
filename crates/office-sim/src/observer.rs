//! Observer: reconciles the event feed with monitor snapshots
//!
//! Events are annotations only. They may be dropped, and they race with
//! the monitor, so queue lists and occupancy always come from
//! `snapshot()`. The feed contributes the log and the set of researchers
//! away on a task, which the monitor cannot see.

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::Arc;

use office_core::{
    EventBus, EventKind, Occupant, PriorityMonitor, TierPolicy, VisitorEvent, VisitorId,
};

use crate::simulator::Simulator;

/// Default number of log lines kept
pub const DEFAULT_LOG_LINES: usize = 200;

/// Observer's picture of the office
#[derive(Debug, Clone, Default)]
pub struct OfficeView {
    pub occupant: Option<Occupant<VisitorId>>,
    /// Waiting ids per tier, rank 0 first
    pub queues: Vec<Vec<VisitorId>>,
    /// Researchers out on their task
    pub on_task: Vec<VisitorId>,
    /// Most recent annotations, oldest first
    pub log: VecDeque<String>,
    pub events_seen: u64,
}

pub struct Observer {
    monitor: Arc<PriorityMonitor<VisitorId>>,
    policy: Arc<TierPolicy>,
    bus: Arc<EventBus>,
    view: OfficeView,
    log_lines: usize,
}

impl Observer {
    pub fn new(
        monitor: Arc<PriorityMonitor<VisitorId>>,
        policy: Arc<TierPolicy>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            monitor,
            policy,
            bus,
            view: OfficeView::default(),
            log_lines: DEFAULT_LOG_LINES,
        }
    }

    /// Observe the office a simulator runs
    pub fn for_simulator(sim: &Simulator) -> Self {
        Self::new(
            Arc::clone(sim.monitor()),
            Arc::clone(sim.policy()),
            Arc::clone(sim.bus()),
        )
    }

    pub fn log_lines(mut self, n: usize) -> Self {
        self.log_lines = n.max(1);
        self
    }

    /// Drain pending events, then reconcile with a fresh snapshot
    pub fn tick(&mut self) -> &OfficeView {
        self.drain_events();
        self.refresh();
        &self.view
    }

    /// Apply every buffered event; returns how many were applied
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.bus.try_next() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Replace occupancy and queues with the monitor's state
    pub fn refresh(&mut self) {
        let snap = self.monitor.snapshot();
        self.view.occupant = snap.occupant;
        self.view.queues = snap.queues;
        // A researcher seen queued or inside is no longer away
        let queues = &self.view.queues;
        let occupant = self.view.occupant.as_ref();
        self.view.on_task.retain(|id| {
            !queues.iter().any(|q| q.contains(id)) && occupant.map_or(true, |o| &o.id != id)
        });
    }

    pub fn view(&self) -> &OfficeView {
        &self.view
    }

    /// Plain-text status block
    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.view.occupant {
            Some(o) => {
                let _ = writeln!(
                    out,
                    "Office: {} {} (admitted as {})",
                    o.id.role(),
                    o.id,
                    self.policy.tier_name(o.tier).unwrap_or("?")
                );
            }
            None => {
                let _ = writeln!(out, "Office: empty");
            }
        }

        let width = self.policy.tiers().map(|(_, t)| t.name.len()).max().unwrap_or(0);
        for (tier, def) in self.policy.tiers() {
            let waiting = self
                .view
                .queues
                .get(tier.as_usize())
                .map(|q| join_ids(q))
                .unwrap_or_default();
            let _ = writeln!(out, "  [{}] {:<width$} : {}", tier, def.name, waiting, width = width);
        }
        if !self.view.on_task.is_empty() {
            let _ = writeln!(out, "  on task: {}", join_ids(&self.view.on_task));
        }
        for line in self.view.log.iter().rev().take(5).rev() {
            let _ = writeln!(out, "  | {}", line);
        }
        out
    }

    fn apply(&mut self, event: VisitorEvent) {
        self.view.events_seen += 1;
        let VisitorEvent { kind, id } = event;
        let role = id.role();
        let line = match kind {
            EventKind::Spawned => format!("Spawned {} {}", role, id),
            EventKind::Arrived => format!("{} {} arrived and queued", role, id),
            EventKind::Entered => {
                self.view.on_task.retain(|v| v != &id);
                format!("{} {} ENTERED the office", role, id)
            }
            EventKind::LeftForTask => {
                if !self.view.on_task.contains(&id) {
                    self.view.on_task.push(id);
                }
                format!("{} {} left to do a task (will return with priority)", role, id)
            }
            EventKind::Reawoken => {
                self.view.on_task.retain(|v| v != &id);
                format!("{} {} finished the task and is waiting to re-enter", role, id)
            }
            EventKind::Left => {
                self.view.on_task.retain(|v| v != &id);
                format!("{} {} left the office", role, id)
            }
            EventKind::GaveUp => format!("{} {} gave up waiting", role, id),
        };
        if self.view.log.len() == self.log_lines {
            self.view.log.pop_front();
        }
        self.view.log.push_back(line);
    }
}

fn join_ids(ids: &[VisitorId]) -> String {
    if ids.is_empty() {
        return "-".into();
    }
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
