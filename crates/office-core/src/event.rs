//! Best-effort event feed from visitor drivers to the observer
//!
//! Many visitor threads publish, one observer drains. Publishing never
//! blocks: when the ring is full the new event is dropped and counted.
//! The observer reconciles against `PriorityMonitor::snapshot`, so a lost
//! event only costs a log line.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::id::VisitorId;
use crate::tier::Role;

/// Default ring capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// What happened to a visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Thread created for the visitor
    Spawned,
    /// Reached the door and is about to queue
    Arrived,
    /// Admitted to the office
    Entered,
    /// Left to do a task, will return
    LeftForTask,
    /// Finished the task, about to queue again
    Reawoken,
    /// Left for good
    Left,
    /// Stopped waiting before admission
    GaveUp,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Spawned => "spawned",
            EventKind::Arrived => "arrived",
            EventKind::Entered => "entered",
            EventKind::LeftForTask => "left for task",
            EventKind::Reawoken => "reawoken",
            EventKind::Left => "left",
            EventKind::GaveUp => "gave up",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitorEvent {
    pub kind: EventKind,
    pub id: VisitorId,
}

impl VisitorEvent {
    #[inline]
    pub fn role(&self) -> Role {
        self.id.role()
    }
}

impl fmt::Display for VisitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.role(), self.id, self.kind)
    }
}

/// Bounded lock-free event ring
pub struct EventBus {
    queue: ArrayQueue<VisitorEvent>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Create a bus holding at most `capacity` undelivered events
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event; returns false if it was dropped
    pub fn publish(&self, kind: EventKind, id: VisitorId) -> bool {
        match self.queue.push(VisitorEvent { kind, id }) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Take the oldest undelivered event
    #[inline]
    pub fn try_next(&self) -> Option<VisitorEvent> {
        self.queue.pop()
    }

    /// Take everything currently buffered, oldest first
    pub fn drain(&self) -> impl Iterator<Item = VisitorEvent> + '_ {
        std::iter::from_fn(move || self.queue.pop())
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("published", &self.published())
            .field("dropped", &self.dropped())
            .finish()
    }
}
