use crate::audio::{AudioBackend, StreamSpec};
use crate::config::AppConfig;
use crate::gpio::{Led, LedDriver};
use crate::threshold::ThresholdPair;
use log::warn;
use std::sync::Arc;

/// State shared by the dispatcher and the pipeline task.
pub struct Context {
    pub config: AppConfig,
    pub thresholds: ThresholdPair,
    pub leds: Arc<dyn LedDriver>,
    pub audio: Arc<dyn AudioBackend>,
}

impl Context {
    pub fn new(config: AppConfig, leds: Arc<dyn LedDriver>, audio: Arc<dyn AudioBackend>) -> Self {
        let thresholds = ThresholdPair::new(config.thresholds.default_db);
        Self {
            config,
            thresholds,
            leds,
            audio,
        }
    }

    /// Stream shape for capture, which is also the shape of the WAV it writes.
    pub fn capture_spec(&self) -> StreamSpec {
        let audio = &self.config.audio;
        StreamSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            chunk_frames: audio.chunk_frames,
        }
    }

    /// LED failures are reported but never stop a pipeline.
    pub fn set_led(&self, led: Led, on: bool) {
        if let Err(e) = self.leds.set(led, on) {
            warn!("Failed to set {led} LED: {e}");
        }
    }
}
