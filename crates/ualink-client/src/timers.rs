// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Repeated callbacks on a drift-free schedule.
//!
//! The heap is generic over the context passed to callbacks so it can be
//! exercised in isolation; the client instantiates it with itself as the
//! context.
//!
//! Scheduling rules:
//!
//! - a callback with interval `I` first fires no later than `now + I`
//! - the N-th fire is scheduled at `t0 + N * I` regardless of when earlier
//!   fires actually ran
//! - callbacks sharing a fire time run in insertion order
//! - interval changes keep the already-scheduled fire and apply afterwards
//! - callbacks registered while a sweep is running first become eligible in
//!   the next sweep
//! - ids are monotonic and never reused within one heap

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::error::UsageError;

/// Smallest accepted repetition interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(5);

/// A repeated callback invoked with the client as context.
pub type RepeatedCallback<C> = Box<dyn FnMut(&mut C)>;

struct TimerEntry<C> {
    /// Taken out while the callback is executing.
    callback: Option<RepeatedCallback<C>>,
    interval: Duration,
    next_fire: Instant,
    /// Applied when rescheduling after the next fire.
    pending_interval: Option<Duration>,
}

// =============================================================================
// TimerHeap
// =============================================================================

/// A min-heap of repeated callbacks keyed by next fire time.
pub struct TimerHeap<C> {
    entries: HashMap<u64, TimerEntry<C>>,
    /// Lazily invalidated: an item is live only if the entry exists and
    /// still agrees on the fire time.
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    next_id: u64,
}

impl<C> TimerHeap<C> {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            queue: BinaryHeap::new(),
            next_id: 1,
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a callback repeating every `interval`, first firing no
    /// later than `now + interval`.
    pub fn add(
        &mut self,
        interval: Duration,
        callback: RepeatedCallback<C>,
        now: Instant,
    ) -> Result<u64, UsageError> {
        if interval < MIN_INTERVAL {
            return Err(UsageError::IntervalTooShort { interval });
        }
        let id = self.next_id;
        self.next_id += 1;

        let next_fire = now + interval;
        self.entries.insert(
            id,
            TimerEntry {
                callback: Some(callback),
                interval,
                next_fire,
                pending_interval: None,
            },
        );
        self.queue.push(Reverse((next_fire, id)));
        Ok(id)
    }

    /// Changes a callback's interval, effective after its next scheduled
    /// fire.
    pub fn change_interval(&mut self, id: u64, interval: Duration) -> Result<(), UsageError> {
        if interval < MIN_INTERVAL {
            return Err(UsageError::IntervalTooShort { interval });
        }
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(UsageError::UnknownCallback { id })?;
        entry.pending_interval = Some(interval);
        Ok(())
    }

    /// Removes a callback. Safe to call from within the callback itself;
    /// the removal then applies to future fires.
    pub fn remove(&mut self, id: u64) -> Result<(), UsageError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(UsageError::UnknownCallback { id })
    }

    /// When the earliest live callback is due.
    pub fn next_due(&mut self) -> Option<Instant> {
        while let Some(Reverse((fire_at, id))) = self.queue.peek().copied() {
            match self.entries.get(&id) {
                Some(entry) if entry.next_fire == fire_at => return Some(fire_at),
                _ => {
                    self.queue.pop();
                }
            }
        }
        None
    }

    /// Snapshots the callbacks due at `now`, in fire-time then insertion
    /// order. Callbacks added after this call are not part of the snapshot.
    pub fn collect_due(&mut self, now: Instant) -> Vec<u64> {
        let mut due = Vec::new();
        while let Some(Reverse((fire_at, id))) = self.queue.peek().copied() {
            if fire_at > now {
                break;
            }
            self.queue.pop();
            if let Some(entry) = self.entries.get(&id) {
                if entry.next_fire == fire_at {
                    due.push(id);
                }
            }
        }
        due
    }

    /// Takes a due callback out for execution. Returns `None` if it was
    /// removed since the snapshot.
    pub fn take_callback(&mut self, id: u64) -> Option<RepeatedCallback<C>> {
        self.entries.get_mut(&id)?.callback.take()
    }

    /// Returns a callback after execution and reschedules it drift-free
    /// from its previous scheduled fire time. A callback whose entry was
    /// removed mid-flight is dropped.
    pub fn return_callback(&mut self, id: u64, callback: RepeatedCallback<C>) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if let Some(interval) = entry.pending_interval.take() {
            entry.interval = interval;
        }
        entry.next_fire += entry.interval;
        entry.callback = Some(callback);
        self.queue.push(Reverse((entry.next_fire, id)));
    }

    /// Drops every callback, keeping the id counter so ids are never
    /// reused.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.queue.clear();
    }
}

impl<C> Default for TimerHeap<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for TimerHeap<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHeap")
            .field("callbacks", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs one sweep the way the client does: snapshot, then fire each.
    fn sweep(heap: &mut TimerHeap<Vec<u64>>, log: &mut Vec<u64>, now: Instant) {
        for id in heap.collect_due(now) {
            if let Some(mut cb) = heap.take_callback(id) {
                cb(log);
                heap.return_callback(id, cb);
            }
        }
    }

    fn logger(id_marker: u64) -> RepeatedCallback<Vec<u64>> {
        Box::new(move |log: &mut Vec<u64>| log.push(id_marker))
    }

    #[test]
    fn test_min_interval_boundary() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let now = Instant::now();
        assert!(matches!(
            heap.add(Duration::from_millis(4), logger(1), now),
            Err(UsageError::IntervalTooShort { .. })
        ));
        assert!(heap.add(Duration::from_millis(5), logger(1), now).is_ok());
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let now = Instant::now();
        let a = heap.add(Duration::from_millis(10), logger(1), now).unwrap();
        let b = heap.add(Duration::from_millis(10), logger(2), now).unwrap();
        assert!(b > a);
        heap.remove(a).unwrap();
        let c = heap.add(Duration::from_millis(10), logger(3), now).unwrap();
        assert!(c > b);
    }

    #[test]
    fn test_drift_free_schedule() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let mut log = Vec::new();
        let t0 = Instant::now();
        let id = heap.add(Duration::from_millis(100), logger(1), t0).unwrap();

        // Sweep late: the fire at t0+100 happens at t0+130, but the next
        // fire stays scheduled for t0+200.
        sweep(&mut heap, &mut log, t0 + Duration::from_millis(130));
        assert_eq!(log, vec![1]);
        assert_eq!(heap.entries[&id].next_fire, t0 + Duration::from_millis(200));

        // Catch-up: sweeping at t0+450 runs the overdue fires one sweep at
        // a time, still on the original grid.
        sweep(&mut heap, &mut log, t0 + Duration::from_millis(450));
        sweep(&mut heap, &mut log, t0 + Duration::from_millis(450));
        sweep(&mut heap, &mut log, t0 + Duration::from_millis(450));
        assert_eq!(log.len(), 4);
        assert_eq!(heap.entries[&id].next_fire, t0 + Duration::from_millis(500));
    }

    #[test]
    fn test_ties_fire_in_insertion_order() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let mut log = Vec::new();
        let t0 = Instant::now();
        heap.add(Duration::from_millis(50), logger(1), t0).unwrap();
        heap.add(Duration::from_millis(50), logger(2), t0).unwrap();
        heap.add(Duration::from_millis(50), logger(3), t0).unwrap();

        sweep(&mut heap, &mut log, t0 + Duration::from_millis(50));
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[test]
    fn test_interval_change_applies_after_next_fire() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let mut log = Vec::new();
        let t0 = Instant::now();
        let id = heap.add(Duration::from_millis(100), logger(1), t0).unwrap();

        heap.change_interval(id, Duration::from_millis(30)).unwrap();
        // The already-scheduled fire stays at t0+100.
        assert_eq!(heap.entries[&id].next_fire, t0 + Duration::from_millis(100));
        sweep(&mut heap, &mut log, t0 + Duration::from_millis(100));
        // Afterwards the new interval applies.
        assert_eq!(heap.entries[&id].next_fire, t0 + Duration::from_millis(130));
    }

    #[test]
    fn test_removal_from_within_callback() {
        struct Ctx {
            heap_ids: Vec<u64>,
            fired: u32,
        }
        // The callback cannot borrow the heap (the client owns both), so
        // removal-from-within is modeled the way the client does it: the
        // callback runs, then the entry is found removed.
        let mut heap: TimerHeap<Ctx> = TimerHeap::new();
        let t0 = Instant::now();
        let id = heap
            .add(
                Duration::from_millis(10),
                Box::new(|ctx: &mut Ctx| ctx.fired += 1),
                t0,
            )
            .unwrap();
        let mut ctx = Ctx {
            heap_ids: vec![id],
            fired: 0,
        };

        let due = heap.collect_due(t0 + Duration::from_millis(10));
        let mut cb = heap.take_callback(due[0]).unwrap();
        cb(&mut ctx);
        // Simulates `remove_repeated_callback(id)` called inside the
        // callback body.
        heap.remove(ctx.heap_ids[0]).unwrap();
        heap.return_callback(due[0], cb);

        assert_eq!(ctx.fired, 1);
        assert!(heap.is_empty());
        assert_eq!(heap.next_due(), None);
    }

    #[test]
    fn test_callbacks_added_during_sweep_wait_for_next_sweep() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        let mut log = Vec::new();
        let t0 = Instant::now();
        heap.add(Duration::from_millis(10), logger(1), t0).unwrap();

        let now = t0 + Duration::from_millis(20);
        let due = heap.collect_due(now);
        for id in due {
            if let Some(mut cb) = heap.take_callback(id) {
                cb(&mut log);
                // A callback registered mid-sweep, already eligible by time.
                heap.add(Duration::from_millis(5), logger(99), t0).unwrap();
                heap.return_callback(id, cb);
            }
        }
        // The new callback did not fire in the sweep that created it.
        assert_eq!(log, vec![1]);

        sweep(&mut heap, &mut log, now);
        assert!(log.contains(&99));
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let mut heap: TimerHeap<Vec<u64>> = TimerHeap::new();
        assert!(matches!(
            heap.remove(42),
            Err(UsageError::UnknownCallback { id: 42 })
        ));
        assert!(matches!(
            heap.change_interval(42, Duration::from_millis(10)),
            Err(UsageError::UnknownCallback { id: 42 })
        ));
    }
}
