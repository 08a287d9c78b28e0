use crate::analyzer::FrequencyBand;
use crate::consts;
use crate::error::ConfigError;
use crate::gpio::EncoderId;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where captures are written and playback reads from.
    pub output_path: PathBuf,

    /// Dispatcher wake-up interval when no events arrive.
    pub idle_poll_ms: u64,

    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub thresholds: ThresholdConfig,

    /// Board wiring is fixed and never read from the settings file.
    #[serde(skip)]
    pub gpio: GpioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(consts::OUTPUT_FILE),
            idle_poll_ms: consts::IDLE_POLL_MS,
            audio: AudioConfig::default(),
            analysis: AnalysisConfig::default(),
            thresholds: ThresholdConfig::default(),
            gpio: GpioConfig::default(),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// Sample rate in Hz used for capture and for the WAV header.
    pub sample_rate: u32,

    /// 1 = mono, 2 = interleaved stereo.
    pub channels: u16,

    /// Frames per pipeline iteration. Bounds stop latency.
    pub chunk_frames: usize,

    /// Linear gain applied while capturing.
    pub volume_boost: f32,

    /// Device names as reported by `--list-devices`. `None` picks the host default.
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: consts::SAMPLE_RATE,
            channels: consts::CHANNELS,
            chunk_frames: consts::CHUNK_FRAMES,
            volume_boost: consts::VOLUME_BOOST,
            input_device: None,
            output_device: None,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Turns the band visualizer off entirely.
    pub enabled: bool,

    /// One threshold per entry of `consts::FREQ_BANDS`.
    pub band_thresholds_db: [f32; 5],
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_thresholds_db: [consts::BAND_THRESHOLD_DB; 5],
        }
    }
}

impl AnalysisConfig {
    pub fn bands(&self) -> Vec<FrequencyBand> {
        consts::FREQ_BANDS
            .iter()
            .zip(self.band_thresholds_db)
            .map(|(&(low_hz, high_hz), threshold_db)| FrequencyBand {
                low_hz,
                high_hz,
                threshold_db,
            })
            .collect()
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Starting value for both encoders. Clamped into the encoder range.
    pub default_db: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default_db: consts::DEFAULT_THRESHOLD_DB,
        }
    }
}

/// Rotary encoder phase lines, board numbered.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EncoderPins {
    pub clk: u8,
    pub dt: u8,
}

/// Board-numbered wiring of the recorder.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PinMap {
    pub record_led: u8,
    pub playback_led: u8,
    pub band_leds: [u8; 5],
    pub button: u8,
    pub record_encoder: EncoderPins,
    pub playback_encoder: EncoderPins,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            record_led: 11,
            playback_led: 15,
            band_leds: [29, 31, 33, 35, 37],
            button: 7,
            record_encoder: EncoderPins { clk: 16, dt: 18 },
            playback_encoder: EncoderPins { clk: 22, dt: 23 },
        }
    }
}

impl PinMap {
    #[cfg_attr(not(feature = "rpi"), allow(dead_code))]
    pub fn encoder(&self, id: EncoderId) -> EncoderPins {
        match id {
            EncoderId::Record => self.record_encoder,
            EncoderId::Playback => self.playback_encoder,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct GpioConfig {
    pub pins: PinMap,
    pub button_debounce: Duration,
    pub encoder_debounce: Duration,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),
            button_debounce: Duration::from_millis(consts::BUTTON_DEBOUNCE_MS),
            encoder_debounce: Duration::from_millis(consts::ENCODER_DEBOUNCE_MS),
        }
    }
}

impl AppConfig {
    /// Load settings from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&contents)?;
        debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipelines cannot run with and pull the default
    /// threshold into the encoder range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if !(1..=2).contains(&self.audio.channels) {
            return Err(invalid(
                "audio.channels",
                format!("expected 1 or 2, got {}", self.audio.channels),
            ));
        }
        if self.audio.chunk_frames == 0 {
            return Err(invalid("audio.chunk_frames", "must be positive"));
        }
        if !self.audio.volume_boost.is_finite() || self.audio.volume_boost <= 0.0 {
            return Err(invalid(
                "audio.volume_boost",
                format!("must be a positive number, got {}", self.audio.volume_boost),
            ));
        }
        if self.idle_poll_ms == 0 {
            return Err(invalid("idle_poll_ms", "must be positive"));
        }
        if let Some(db) = self
            .analysis
            .band_thresholds_db
            .iter()
            .find(|db| !db.is_finite())
        {
            return Err(invalid(
                "analysis.band_thresholds_db",
                format!("{db} is not a finite level"),
            ));
        }

        self.thresholds.default_db = self
            .thresholds
            .default_db
            .clamp(consts::THRESHOLD_MIN_DB, consts::THRESHOLD_MAX_DB);

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
