//! Real-time capture into the ring store via cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block on a mutex, perform I/O, or take unbounded time.
//! `RingProducer::store` is lock-free and bounded, so the callback only
//! deinterleaves into a reusable planar scratch and stores the block at the
//! current absolute capture time.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `RingCapture` therefore must be created and dropped on the same
//! thread. The consumer half is `Send` and goes wherever the reader lives.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

#[cfg(feature = "audio-cpal")]
use crate::frame::FrameBuffer;
use crate::{
    error::{Result, TactusError},
    ring::RingConsumer,
    time::SampleTime,
};

#[cfg(feature = "audio-cpal")]
use crate::ring::RingStore;

/// Handle to an active capture stream feeding a ring store.
///
/// **Not `Send`** — `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct RingCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag — set to `false` to signal the callback to no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
    /// Channels delivered by the device; equals the ring's channel count.
    pub channel_count: usize,
    /// Absolute sample time of the next frame the callback will store.
    clock: Arc<AtomicI64>,
}

impl RingCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device. Builds a ring store of `capacity_frames`
    /// (rounded up to a power of two) sized to the device channel count and
    /// returns the consumer half alongside the capture handle.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        capacity_frames: usize,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<(Self, RingConsumer<f32>)> {
        let host = cpal::default_host();

        let mut selected_device = None;
        if let Some(preferred_name) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == preferred_name)
                            .unwrap_or(false)
                    });
                    if selected_device.is_none() {
                        warn!(
                            "preferred input device '{}' not found, falling back",
                            preferred_name
                        );
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = match selected_device {
            Some(device) => device,
            None => host
                .default_input_device()
                .ok_or(TactusError::NoDefaultInputDevice)?,
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| TactusError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let channel_count = usize::from(channels);

        info!(sample_rate, channel_count, capacity_frames, "capture config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut producer, consumer) =
            RingStore::<f32>::new(channel_count, capacity_frames)?.split();

        let clock = Arc::new(AtomicI64::new(0));

        // Pre-clone one Arc per sample format branch so each closure owns
        // its flag and clock.
        let running_f32 = Arc::clone(&running);
        let running_i16 = Arc::clone(&running);
        let clock_f32 = Arc::clone(&clock);
        let clock_i16 = Arc::clone(&clock);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let ch = channel_count;
                let mut scratch = FrameBuffer::<f32>::new(ch, 0);
                let mut cursor: SampleTime = 0;
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !running_f32.load(Ordering::Relaxed) {
                            return;
                        }
                        let frames = data.len() / ch;
                        if frames == 0 {
                            return;
                        }
                        scratch.reset(frames);
                        for c in 0..ch {
                            let lane = scratch.channel_mut(c);
                            for (f, slot) in lane.iter_mut().enumerate() {
                                *slot = data[f * ch + c];
                            }
                        }
                        if let Err(e) = producer.store(&scratch, frames, cursor) {
                            warn!("capture block of {frames} frames dropped: {e}");
                        }
                        cursor += frames as SampleTime;
                        clock_f32.store(cursor, Ordering::Release);
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            SampleFormat::I16 => {
                let ch = channel_count;
                let mut scratch = FrameBuffer::<f32>::new(ch, 0);
                let mut cursor: SampleTime = 0;
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !running_i16.load(Ordering::Relaxed) {
                            return;
                        }
                        let frames = data.len() / ch;
                        if frames == 0 {
                            return;
                        }
                        scratch.reset(frames);
                        for c in 0..ch {
                            let lane = scratch.channel_mut(c);
                            for (f, slot) in lane.iter_mut().enumerate() {
                                *slot = data[f * ch + c] as f32 / 32768.0;
                            }
                        }
                        if let Err(e) = producer.store(&scratch, frames, cursor) {
                            warn!("capture block of {frames} frames dropped: {e}");
                        }
                        cursor += frames as SampleTime;
                        clock_i16.store(cursor, Ordering::Release);
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(TactusError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| TactusError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| TactusError::AudioStream(e.to_string()))?;

        Ok((
            Self {
                _stream: stream,
                running,
                sample_rate,
                channel_count,
                clock,
            },
            consumer,
        ))
    }

    /// Open the system default microphone.
    ///
    /// Must be called from the thread that will also drop this value.
    ///
    /// # Errors
    /// Returns `TactusError::NoDefaultInputDevice` when no microphone is
    /// available, or `TactusError::AudioStream` if cpal fails to build the
    /// stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open_default(
        capacity_frames: usize,
        running: Arc<AtomicBool>,
    ) -> Result<(Self, RingConsumer<f32>)> {
        Self::open_with_preference(capacity_frames, running, None)
    }

    /// Absolute sample time of the capture head: every frame before this
    /// has been stored (or intentionally dropped). Fetching a tail that
    /// ends at or before this position reads the freshest audio.
    pub fn position(&self) -> SampleTime {
        self.clock.load(Ordering::Acquire)
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl RingCapture {
    pub fn open_with_preference(
        _capacity_frames: usize,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<(Self, RingConsumer<f32>)> {
        Err(TactusError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(
        capacity_frames: usize,
        running: Arc<AtomicBool>,
    ) -> Result<(Self, RingConsumer<f32>)> {
        Self::open_with_preference(capacity_frames, running, None)
    }
}
