//! Provider event hub with scoped subscriptions
//!
//! The platform adapter emits timestamped provider events into `AdEvents`.
//! A `Subscription` queues the events for one ad unit while it is alive;
//! dropping it detaches the listener, so an attempt that owns its
//! subscription can never leak listeners into the next attempt.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use super::AdKind;
use crate::Millis;

/// Lifecycle callbacks reported by the native ad SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    Showed,
    Rewarded,
    Dismissed,
    FailedToLoad,
    FailedToShow,
}

type Queue = Rc<RefCell<VecDeque<(ProviderEvent, Millis)>>>;

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<(u64, AdKind, Queue)>,
}

/// Shared event hub; clones refer to the same hub
#[derive(Debug, Clone, Default)]
pub struct AdEvents {
    inner: Rc<RefCell<HubInner>>,
}

impl AdEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every live subscription for `unit`.
    /// Events with no listener are dropped.
    pub fn emit(&self, unit: AdKind, event: ProviderEvent, at: Millis) {
        let inner = self.inner.borrow();
        let mut delivered = false;
        for (_, kind, queue) in &inner.listeners {
            if *kind == unit {
                queue.borrow_mut().push_back((event, at));
                delivered = true;
            }
        }
        if !delivered {
            log::debug!("{:?} {:?} at {} had no listener", unit, event, at);
        }
    }

    /// Start listening for events of one ad unit
    pub fn subscribe(&self, unit: AdKind) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let queue: Queue = Rc::default();
        inner.listeners.push((id, unit, queue.clone()));
        Subscription {
            id,
            hub: Rc::downgrade(&self.inner),
            queue,
        }
    }

    /// Live subscriptions for `unit`
    pub fn listener_count(&self, unit: AdKind) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == unit)
            .count()
    }
}

/// A live listener; detached on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    hub: Weak<RefCell<HubInner>>,
    queue: Queue,
}

impl Subscription {
    /// Timestamp of the oldest queued event
    pub fn peek_at(&self) -> Option<Millis> {
        self.queue.borrow().front().map(|(_, at)| *at)
    }

    /// Take the oldest queued event if it happened at or before `now`
    pub fn pop_until(&self, now: Millis) -> Option<(ProviderEvent, Millis)> {
        let mut queue = self.queue.borrow_mut();
        match queue.front() {
            Some((_, at)) if *at <= now => queue.pop_front(),
            _ => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.borrow_mut().listeners.retain(|(id, _, _)| *id != self.id);
        }
    }
}
