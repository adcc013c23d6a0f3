//! Frame container contract between callers and the ring store.
//!
//! The store is agnostic to the concrete audio container: anything that can
//! expose one contiguous span of samples per channel works as a source or a
//! sink. Interleaved callers deinterleave at this boundary (the capture
//! module keeps a planar scratch for exactly that).

use bytemuck::NoUninit;

/// Element type of a ring slot.
///
/// `NoUninit` is what lets the store keep its slots in lock-free atomic
/// cells without any `unsafe`. `SILENCE` is the value substituted for
/// frames outside the valid window; it is numeric zero for every built-in
/// impl but stays a constant so formats with a nonzero midpoint can be
/// added without touching the store.
pub trait Sample: Copy + Default + NoUninit + Send + Sync + 'static {
    const SILENCE: Self;
}

impl Sample for f32 {
    const SILENCE: Self = 0.0;
}

impl Sample for f64 {
    const SILENCE: Self = 0.0;
}

impl Sample for i16 {
    const SILENCE: Self = 0;
}

impl Sample for i32 {
    const SILENCE: Self = 0;
}

/// A multi-channel block of frames the store can read from.
pub trait FrameSource<S: Sample> {
    fn channel_count(&self) -> usize;

    /// Frames available per channel. `store` refuses sources shorter than
    /// the requested write length.
    fn frame_count(&self) -> usize;

    /// Contiguous samples of one channel. `index < channel_count()`.
    fn channel(&self, index: usize) -> &[S];
}

/// A multi-channel block of frames the store can write into.
pub trait FrameSink<S: Sample> {
    fn channel_count(&self) -> usize;

    fn frame_count(&self) -> usize;

    /// Mutable contiguous samples of one channel. `index < channel_count()`.
    fn channel_mut(&mut self, index: usize) -> &mut [S];
}

/// Owned planar frame buffer: one contiguous allocation, channel-major.
///
/// The concrete container used by the capture scratch and the tests; also
/// the easiest way for callers to satisfy [`FrameSource`]/[`FrameSink`].
#[derive(Debug, Clone)]
pub struct FrameBuffer<S: Sample = f32> {
    channels: usize,
    frames: usize,
    data: Vec<S>,
}

impl<S: Sample> FrameBuffer<S> {
    /// Allocate a zeroed buffer of `channels` × `frames` samples.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            frames,
            data: vec![S::SILENCE; channels * frames],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Reset every sample to silence.
    pub fn clear(&mut self) {
        self.data.fill(S::SILENCE);
    }

    /// Reshape to a new frame length, zeroing the contents. Keeps the
    /// allocation when it is already large enough, so a capture callback
    /// can reuse one scratch across variably sized blocks.
    pub fn reset(&mut self, frames: usize) {
        self.frames = frames;
        self.data.clear();
        self.data.resize(self.channels * frames, S::SILENCE);
    }

    pub fn channel(&self, index: usize) -> &[S] {
        let start = index * self.frames;
        &self.data[start..start + self.frames]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [S] {
        let start = index * self.frames;
        &mut self.data[start..start + self.frames]
    }
}

impl<S: Sample> FrameSource<S> for FrameBuffer<S> {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn frame_count(&self) -> usize {
        self.frames
    }

    fn channel(&self, index: usize) -> &[S] {
        FrameBuffer::channel(self, index)
    }
}

impl<S: Sample> FrameSink<S> for FrameBuffer<S> {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn frame_count(&self) -> usize {
        self.frames
    }

    fn channel_mut(&mut self, index: usize) -> &mut [S] {
        FrameBuffer::channel_mut(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_independent_spans() {
        let mut buf = FrameBuffer::<f32>::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        buf.channel_mut(1).copy_from_slice(&[5.0, 6.0, 7.0, 8.0]);

        assert_eq!(buf.channel(0), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buf.channel(1), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn new_buffer_is_silent() {
        let buf = FrameBuffer::<i16>::new(3, 5);
        for ch in 0..3 {
            assert!(buf.channel(ch).iter().all(|&s| s == i16::SILENCE));
        }
    }

    #[test]
    fn clear_restores_silence() {
        let mut buf = FrameBuffer::<f32>::new(1, 3);
        buf.channel_mut(0).fill(0.7);
        buf.clear();
        assert_eq!(buf.channel(0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn reset_reshapes_and_zeroes() {
        let mut buf = FrameBuffer::<f32>::new(2, 2);
        buf.channel_mut(1).fill(0.5);

        buf.reset(3);
        assert_eq!(buf.frames(), 3);
        assert_eq!(buf.channel(1), &[0.0, 0.0, 0.0]);

        buf.reset(1);
        assert_eq!(buf.frames(), 1);
        assert_eq!(buf.channel(0), &[0.0]);
    }
}
