use std::path::PathBuf;
use thiserror::Error;

/// Failures opening or driving an audio device.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No {0} device available")]
    NoDevice(&'static str),

    #[error("Audio device named '{0}' not found")]
    DeviceNotFound(String),

    #[error("Failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Failed to query device config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Unsupported device sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("Audio stream closed")]
    StreamClosed,

    #[error("Audio stream stopped making progress")]
    Stalled,
}

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Board pin {0} is not a GPIO line")]
    InvalidPin(u8),

    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Hardware(#[from] rppal::gpio::Error),
}

/// Reasons a capture or playback task ends early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("No recording at {}", .0.display())]
    MissingRecording(PathBuf),

    #[error("Unsupported WAV format: {bits}-bit {format:?}")]
    UnsupportedWav {
        bits: u16,
        format: hound::SampleFormat,
    },

    #[error("Pipeline task panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
