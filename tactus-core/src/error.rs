use thiserror::Error;

/// All errors produced by tactus-core.
#[derive(Debug, Error)]
pub enum TactusError {
    #[error("write of {requested} frames exceeds ring capacity of {capacity}")]
    TooMuch { requested: usize, capacity: usize },

    #[error("channel count mismatch: ring has {ring}, buffer has {buffer}")]
    ChannelMismatch { ring: usize, buffer: usize },

    #[error("buffer holds {available} frames but {requested} were requested")]
    ShortBuffer { requested: usize, available: usize },

    #[error("channel count must be positive")]
    ZeroChannels,

    #[error("capacity must be positive")]
    ZeroCapacity,

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,
}

pub type Result<T> = std::result::Result<T, TactusError>;
