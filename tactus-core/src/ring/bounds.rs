//! Window policy and lock-free publication of the valid time bounds.
//!
//! Two independent pieces:
//! - [`plan_write`] decides, from the current window and an incoming write
//!   range, what the window becomes — a pure function, so the reset/extend
//!   policy is pinned by unit tests without touching sample memory.
//! - [`BoundsQueue`] publishes `(start, end)` pairs from the single writer
//!   to any number of readers. Readers must never observe a torn pair, and
//!   a pair must only become visible after the sample data it describes —
//!   hence generation-stamped slots and release/acquire ordering.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::time::{SampleTime, TimeBounds};

/// Outcome of [`plan_write`]: the window the store will hold once the
/// write's samples are in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WritePlan {
    /// The write begins behind the current end. Everything previously
    /// stored is stale; the window becomes exactly the write range.
    Reset(TimeBounds),
    /// The write lands at or past the current end. The window keeps its
    /// start — raised only as far as eviction demands — and its end moves
    /// to the end of the write.
    Extend(TimeBounds),
}

impl WritePlan {
    pub(crate) fn window(self) -> TimeBounds {
        match self {
            WritePlan::Reset(w) | WritePlan::Extend(w) => w,
        }
    }
}

/// Classify a write against the current window.
///
/// Callers guarantee `write` is non-empty and spans at most
/// `capacity` frames; under those preconditions the returned window always
/// satisfies `end - start <= capacity` and `end == write.end`.
pub(crate) fn plan_write(current: TimeBounds, write: TimeBounds, capacity: usize) -> WritePlan {
    if write.start < current.end {
        // Rewriting live frames, or jumping backward past them: either way
        // the old content cannot be trusted alongside the new.
        return WritePlan::Reset(write);
    }

    let capacity = capacity as SampleTime;
    let start = if write.end - current.start > capacity {
        write.end - capacity
    } else {
        current.start
    };
    WritePlan::Extend(TimeBounds::new(start, write.end))
}

/// Slots in the publication queue. A reader is only disturbed if the
/// writer laps the whole queue mid-read, in which case it just retries.
const QUEUE_SLOTS: usize = 32;

#[derive(Default)]
struct BoundsSlot {
    start: AtomicI64,
    end: AtomicI64,
    generation: AtomicU64,
}

/// Generation-stamped bounds publication ring.
///
/// The writer appends the new pair into slot `gen % QUEUE_SLOTS` and then
/// advances the head with a release store; the release makes every sample
/// written before the call visible to a reader that acquires the head.
/// Readers validate the slot's generation stamp after loading the pair and
/// retry if the writer overwrote it underneath them.
pub(crate) struct BoundsQueue {
    slots: [BoundsSlot; QUEUE_SLOTS],
    head: AtomicU64,
}

impl BoundsQueue {
    pub(crate) fn new() -> Self {
        // Slot 0 carries generation 0 with the empty (0, 0) window, so a
        // freshly built queue reads back as empty without a first `set`.
        Self {
            slots: std::array::from_fn(|_| BoundsSlot::default()),
            head: AtomicU64::new(0),
        }
    }

    /// Publish a new window. Single writer only.
    pub(crate) fn set(&self, bounds: TimeBounds) {
        let next = self.head.load(Ordering::Relaxed) + 1;
        let slot = &self.slots[(next as usize) % QUEUE_SLOTS];
        slot.start.store(bounds.start, Ordering::Relaxed);
        slot.end.store(bounds.end, Ordering::Relaxed);
        slot.generation.store(next, Ordering::Release);
        self.head.store(next, Ordering::Release);
    }

    /// Snapshot the current window. Safe from any thread; never returns a
    /// torn pair.
    pub(crate) fn get(&self) -> TimeBounds {
        loop {
            let gen = self.head.load(Ordering::Acquire);
            let slot = &self.slots[(gen as usize) % QUEUE_SLOTS];
            let start = slot.start.load(Ordering::Acquire);
            let end = slot.end.load(Ordering::Acquire);
            if slot.generation.load(Ordering::Acquire) == gen {
                return TimeBounds::new(start, end);
            }
            std::hint::spin_loop();
        }
    }
}
