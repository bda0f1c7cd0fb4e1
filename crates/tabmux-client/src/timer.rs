//! Cancelable one-shot timers on a virtual clock.
//!
//! The wheel never sleeps. Its owner moves the clock forward with
//! [`TimerWheel::set_now`] and pops due events one at a time, so the same
//! code runs under a real async driver and under tests that advance time by
//! hand.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Identifies one scheduled timer. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// A set of pending one-shot timers, each carrying an event of type `E`.
#[derive(Debug)]
pub struct TimerWheel<E> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), E>,
    deadlines: HashMap<u64, Duration>,
}

impl<E> Default for TimerWheel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerWheel<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 1,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward. Moving backwards is ignored.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Schedule `event` to fire `delay` after the current time.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.now + delay;
        self.queue.insert((deadline, id), event);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => {
                self.queue.remove(&(deadline, handle.0));
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    /// Earliest deadline among pending timers.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer whose deadline has passed.
    ///
    /// Timers with equal deadlines fire in scheduling order.
    pub fn pop_due(&mut self) -> Option<(TimerHandle, E)> {
        let (&(deadline, id), _) = self.queue.iter().next()?;
        if deadline > self.now {
            return None;
        }
        let event = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerHandle(id), event))
    }
}
