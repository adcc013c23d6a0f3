//! The absolute-time ring store.
//!
//! A fixed number of per-channel slot arrays ("lanes") addressed by
//! absolute sample time: frame `t` always lives in slot `t & (capacity-1)`.
//! The store publishes a valid window `[start, end)`; writes move the
//! window, reads never do.
//!
//! # Real-time contract
//!
//! `store`, `fetch` and `time_bounds` are synchronous, bounded-time and
//! lock-free: they copy at most `capacity` frames and never allocate after
//! construction. Every slot is an atomic cell, so the writer and reader
//! sides may run on different threads with plain `&` sharing and no
//! `unsafe`. Bounds are published after the samples they describe
//! (release), and acquired before samples are read, so a reader that sees
//! `end == E` also sees the data for `[start, E)`.
//!
//! # Threading discipline
//!
//! One writer, any number of readers. [`RingStore::split`] hands out a
//! non-cloneable [`RingProducer`] and a cloneable [`RingConsumer`] so the
//! discipline is enforced by the type system; the unsplit store offers
//! `&mut self` / `&self` methods for single-threaded use.

mod bounds;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic::Atomic;
use tracing::{debug, trace};

use crate::error::{Result, TactusError};
use crate::frame::{FrameSink, FrameSource, Sample};
use crate::time::{SampleTime, TimeBounds};
use bounds::{plan_write, BoundsQueue, WritePlan};

type Lane<S> = Box<[Atomic<S>]>;

/// Fixed-capacity multi-channel sample store indexed by absolute time.
pub struct RingStore<S: Sample = f32> {
    lanes: Box<[Lane<S>]>,
    /// Slot count per lane; always a power of two.
    capacity: usize,
    mask: SampleTime,
    bounds: BoundsQueue,
}

impl<S: Sample> RingStore<S> {
    /// Allocate a store with `channels` lanes of at least `capacity_frames`
    /// slots each. The capacity is rounded up to the next power of two so
    /// time-to-slot mapping is a mask instead of a division; the effective
    /// value is reported by [`capacity_frames`](Self::capacity_frames).
    pub fn new(channels: usize, capacity_frames: usize) -> Result<Self> {
        if channels == 0 {
            return Err(TactusError::ZeroChannels);
        }
        if capacity_frames == 0 {
            return Err(TactusError::ZeroCapacity);
        }

        let capacity = capacity_frames.next_power_of_two();
        let lanes = (0..channels)
            .map(|_| {
                (0..capacity)
                    .map(|_| Atomic::new(S::SILENCE))
                    .collect::<Vec<_>>()
                    .into_boxed_slice()
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(channels, capacity_frames = capacity, "ring store allocated");

        Ok(Self {
            lanes,
            capacity,
            mask: capacity as SampleTime - 1,
            bounds: BoundsQueue::new(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.lanes.len()
    }

    /// Effective (power-of-two) capacity in frames per channel.
    pub fn capacity_frames(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the valid window. Never torn; callable from any thread.
    pub fn time_bounds(&self) -> TimeBounds {
        self.bounds.get()
    }

    /// Copy `frames` frames per channel from `source` into the slots for
    /// `[start_write, start_write + frames)` and move the valid window.
    ///
    /// A write beginning behind the current end resets the window to
    /// exactly the write range (older frames become unreadable). A write at
    /// or past the end extends the window, zero-filling any skipped gap and
    /// evicting the oldest frames once the span would exceed capacity.
    ///
    /// # Errors
    /// [`TactusError::TooMuch`] if `frames` exceeds the capacity — the
    /// store is left untouched. [`TactusError::ChannelMismatch`] /
    /// [`TactusError::ShortBuffer`] on a source that does not fit the ring.
    pub fn store<F>(&mut self, source: &F, frames: usize, start_write: SampleTime) -> Result<()>
    where
        F: FrameSource<S>,
    {
        self.store_frames(source, frames, start_write)
    }

    /// Copy `frames` frames per channel for `[start_read, start_read +
    /// frames)` into `sink`. Positions outside the valid window come back
    /// as [`Sample::SILENCE`]; the window is never modified. Underrun,
    /// overrun and the empty store are not errors.
    pub fn fetch<F>(&self, sink: &mut F, frames: usize, start_read: SampleTime) -> Result<()>
    where
        F: FrameSink<S>,
    {
        self.fetch_frames(sink, frames, start_read)
    }

    /// Split into the single-writer / shared-reader handle pair.
    pub fn split(self) -> (RingProducer<S>, RingConsumer<S>) {
        let shared = Arc::new(self);
        (
            RingProducer {
                shared: Arc::clone(&shared),
            },
            RingConsumer { shared },
        )
    }

    // ── Internals (single logical writer for store_frames) ──────────────

    fn slot(&self, t: SampleTime) -> usize {
        // Two's-complement bit-and maps negative times correctly.
        (t & self.mask) as usize
    }

    fn store_frames<F>(&self, source: &F, frames: usize, start_write: SampleTime) -> Result<()>
    where
        F: FrameSource<S>,
    {
        if source.channel_count() != self.lanes.len() {
            return Err(TactusError::ChannelMismatch {
                ring: self.lanes.len(),
                buffer: source.channel_count(),
            });
        }
        if frames == 0 {
            return Ok(());
        }
        if frames > self.capacity {
            return Err(TactusError::TooMuch {
                requested: frames,
                capacity: self.capacity,
            });
        }
        if source.frame_count() < frames {
            return Err(TactusError::ShortBuffer {
                requested: frames,
                available: source.frame_count(),
            });
        }

        let write = TimeBounds::spanning(start_write, frames);
        let current = self.bounds.get();

        // Retract the window before touching sample memory so a concurrent
        // fetch never sees frames that are mid-overwrite as valid.
        let staged = match plan_write(current, write, self.capacity) {
            WritePlan::Reset(w) => {
                trace!(?current, ?write, "window reset on backward write");
                TimeBounds::new(w.start, w.start)
            }
            WritePlan::Extend(w) => TimeBounds::new(w.start, current.end.max(w.start)),
        };
        if staged != current {
            self.bounds.set(staged);
        }

        // A forward gap leaves slots between the old end and the write
        // start inside the window; they must read back as silence.
        if write.start > staged.end {
            let zero_from = staged.end.max(write.start - self.capacity as SampleTime);
            self.zero_lanes(zero_from, write.start);
        }

        for (index, lane) in self.lanes.iter().enumerate() {
            self.copy_into_lane(lane, &source.channel(index)[..frames], write.start);
        }

        // Publish the samples: release-stores the final window.
        self.bounds.set(TimeBounds::new(staged.start, write.end));
        Ok(())
    }

    fn fetch_frames<F>(&self, sink: &mut F, frames: usize, start_read: SampleTime) -> Result<()>
    where
        F: FrameSink<S>,
    {
        if sink.channel_count() != self.lanes.len() {
            return Err(TactusError::ChannelMismatch {
                ring: self.lanes.len(),
                buffer: sink.channel_count(),
            });
        }
        if frames == 0 {
            return Ok(());
        }
        if sink.frame_count() < frames {
            return Err(TactusError::ShortBuffer {
                requested: frames,
                available: sink.frame_count(),
            });
        }

        let requested = TimeBounds::spanning(start_read, frames);
        let window = self.bounds.get();

        let valid_start = requested.start.max(window.start);
        let valid_end = requested.end.min(window.end);

        if valid_start >= valid_end {
            // Entirely outside the window (or the store is empty).
            for index in 0..self.lanes.len() {
                sink.channel_mut(index)[..frames].fill(S::SILENCE);
            }
            return Ok(());
        }

        let lead = (valid_start - requested.start) as usize;
        let valid_len = (valid_end - valid_start) as usize;

        for (index, lane) in self.lanes.iter().enumerate() {
            let dst = &mut sink.channel_mut(index)[..frames];
            dst[..lead].fill(S::SILENCE);
            self.copy_from_lane(lane, &mut dst[lead..lead + valid_len], valid_start);
            dst[lead + valid_len..].fill(S::SILENCE);
        }
        Ok(())
    }

    fn zero_lanes(&self, from: SampleTime, to: SampleTime) {
        for lane in self.lanes.iter() {
            for t in from..to {
                lane[self.slot(t)].store(S::SILENCE, Ordering::Relaxed);
            }
        }
    }

    /// Write `src` into the slots starting at time `start`, wrapping in at
    /// most two contiguous segments.
    fn copy_into_lane(&self, lane: &Lane<S>, src: &[S], start: SampleTime) {
        let first = self.slot(start);
        let head_len = src.len().min(self.capacity - first);

        for (cell, &value) in lane[first..first + head_len].iter().zip(&src[..head_len]) {
            cell.store(value, Ordering::Relaxed);
        }
        for (cell, &value) in lane.iter().zip(&src[head_len..]) {
            cell.store(value, Ordering::Relaxed);
        }
    }

    /// Read the slots starting at time `start` into `dst`, wrapping in at
    /// most two contiguous segments.
    fn copy_from_lane(&self, lane: &Lane<S>, dst: &mut [S], start: SampleTime) {
        let first = self.slot(start);
        let head_len = dst.len().min(self.capacity - first);
        let (head, tail) = dst.split_at_mut(head_len);

        for (value, cell) in head.iter_mut().zip(&lane[first..first + head_len]) {
            *value = cell.load(Ordering::Relaxed);
        }
        for (value, cell) in tail.iter_mut().zip(lane.iter()) {
            *value = cell.load(Ordering::Relaxed);
        }
    }
}

/// Writer half of a split store. Not `Clone`: exactly one producer exists,
/// and `store` takes `&mut self`, so the single-writer rule holds by
/// construction.
pub struct RingProducer<S: Sample = f32> {
    shared: Arc<RingStore<S>>,
}

impl<S: Sample> RingProducer<S> {
    /// See [`RingStore::store`].
    pub fn store<F>(&mut self, source: &F, frames: usize, start_write: SampleTime) -> Result<()>
    where
        F: FrameSource<S>,
    {
        self.shared.store_frames(source, frames, start_write)
    }

    pub fn time_bounds(&self) -> TimeBounds {
        self.shared.time_bounds()
    }

    pub fn channel_count(&self) -> usize {
        self.shared.channel_count()
    }

    pub fn capacity_frames(&self) -> usize {
        self.shared.capacity_frames()
    }
}

/// Reader half of a split store. Cloneable — fetches are read-only and any
/// number may run concurrently.
///
/// A fetch that races an evicting store can return frames the writer was
/// replacing during the copy. Keeping the read position a safe distance
/// behind the write head (less than one capacity span) avoids this; the
/// window itself is always internally consistent.
#[derive(Clone)]
pub struct RingConsumer<S: Sample = f32> {
    shared: Arc<RingStore<S>>,
}

impl<S: Sample> RingConsumer<S> {
    /// See [`RingStore::fetch`].
    pub fn fetch<F>(&self, sink: &mut F, frames: usize, start_read: SampleTime) -> Result<()>
    where
        F: FrameSink<S>,
    {
        self.shared.fetch_frames(sink, frames, start_read)
    }

    pub fn time_bounds(&self) -> TimeBounds {
        self.shared.time_bounds()
    }

    pub fn channel_count(&self) -> usize {
        self.shared.channel_count()
    }

    pub fn capacity_frames(&self) -> usize {
        self.shared.capacity_frames()
    }
}
