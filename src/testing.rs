//! Fake audio devices and LEDs for exercising pipelines and the controller
//! without hardware.

use crate::audio::{AudioBackend, InputStream, OutputStream, StreamSpec};
use crate::config::AppConfig;
use crate::context::Context;
use crate::error::{AudioError, GpioError};
use crate::gpio::{Led, LedDriver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Exactly 23 cycles per 1024-frame chunk at 44.1kHz (~990.5 Hz).
pub const TONE_HZ: f32 = 23.0 * 44100.0 / 1024.0;

/// Index of the analysis band containing `TONE_HZ` (Mid, 800..2000 Hz).
pub const TONE_BAND: usize = 2;

/// Interleaved sine starting at phase zero, same value on every channel.
pub fn tone(freq: f32, amplitude: f32, frames: usize, channels: u16, sample_rate: u32) -> Vec<i16> {
    tone_from(0, freq, amplitude, frames, channels, sample_rate)
}

fn tone_from(
    first_frame: usize,
    freq: f32,
    amplitude: f32,
    frames: usize,
    channels: u16,
    sample_rate: u32,
) -> Vec<i16> {
    let step = std::f64::consts::TAU * f64::from(freq) / f64::from(sample_rate);
    (first_frame..first_frame + frames)
        .flat_map(|n| {
            let value = (f64::from(amplitude) * (step * n as f64).sin()).round() as i16;
            std::iter::repeat_n(value, channels as usize)
        })
        .collect()
}

/// Audio backend whose input produces a continuous `TONE_HZ` sine and whose
/// output records every chunk written to it.
pub struct FakeAudio {
    amplitude: f32,
    stop_after: Mutex<Option<(usize, Arc<AtomicBool>)>>,
    fail_input_after: Mutex<Option<usize>>,
    hang_input: Mutex<Option<Arc<AtomicBool>>>,
    open_streams: Arc<AtomicUsize>,
    opened: AtomicUsize,
    played: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl FakeAudio {
    pub fn new(amplitude: f32) -> Arc<Self> {
        Arc::new(Self {
            amplitude,
            stop_after: Mutex::new(None),
            fail_input_after: Mutex::new(None),
            hang_input: Mutex::new(None),
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
            played: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Raise `stop` while delivering the `chunks`-th chunk of each capture.
    pub fn stop_after(self: Arc<Self>, chunks: usize, stop: Arc<AtomicBool>) -> Arc<Self> {
        *self.stop_after.lock().unwrap() = Some((chunks, stop));
        self
    }

    /// Fail every read after `chunks` successful ones.
    pub fn fail_input_after(self: Arc<Self>, chunks: usize) -> Arc<Self> {
        *self.fail_input_after.lock().unwrap() = Some(chunks);
        self
    }

    /// Block every read until `unblock` is set, then fail it.
    pub fn hang_input(self: Arc<Self>, unblock: Arc<AtomicBool>) -> Arc<Self> {
        *self.hang_input.lock().unwrap() = Some(unblock);
        self
    }

    /// The un-boosted samples of capture chunk `index`.
    pub fn source_chunk(&self, index: usize, spec: &StreamSpec) -> Vec<i16> {
        tone_from(
            index * spec.chunk_frames,
            TONE_HZ,
            self.amplitude,
            spec.chunk_frames,
            spec.channels,
            spec.sample_rate,
        )
    }

    /// Streams currently held open.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Streams opened over the backend's lifetime.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> Vec<Vec<i16>> {
        self.played.lock().unwrap().clone()
    }

    fn track_open(&self) -> OpenGuard {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        OpenGuard(self.open_streams.clone())
    }
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeInput {
    _guard: OpenGuard,
    amplitude: f32,
    spec: StreamSpec,
    chunks: usize,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
    fail_after: Option<usize>,
    hang: Option<Arc<AtomicBool>>,
}

impl InputStream for FakeInput {
    fn read_chunk(&mut self, buf: &mut [i16]) -> Result<(), AudioError> {
        if self.fail_after.is_some_and(|n| self.chunks >= n) {
            return Err(AudioError::StreamClosed);
        }

        if let Some(unblock) = &self.hang {
            while !unblock.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
            return Err(AudioError::StreamClosed);
        }

        // Pace roughly like a device so stop requests land mid-capture
        thread::sleep(Duration::from_millis(1));

        let samples = tone_from(
            self.chunks * self.spec.chunk_frames,
            TONE_HZ,
            self.amplitude,
            buf.len() / self.spec.channels as usize,
            self.spec.channels,
            self.spec.sample_rate,
        );
        buf.copy_from_slice(&samples);
        self.chunks += 1;

        if let Some((n, stop)) = &self.stop_after {
            if self.chunks >= *n {
                stop.store(true, Ordering::Release);
            }
        }
        Ok(())
    }
}

struct FakeOutput {
    _guard: OpenGuard,
    played: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl OutputStream for FakeOutput {
    fn write_chunk(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        self.played.lock().unwrap().push(samples.to_vec());
        Ok(())
    }
}

impl AudioBackend for FakeAudio {
    fn open_input(&self, spec: &StreamSpec) -> Result<Box<dyn InputStream>, AudioError> {
        Ok(Box::new(FakeInput {
            _guard: self.track_open(),
            amplitude: self.amplitude,
            spec: *spec,
            chunks: 0,
            stop_after: self.stop_after.lock().unwrap().clone(),
            fail_after: *self.fail_input_after.lock().unwrap(),
            hang: self.hang_input.lock().unwrap().clone(),
        }))
    }

    fn open_output(&self, _spec: &StreamSpec) -> Result<Box<dyn OutputStream>, AudioError> {
        Ok(Box::new(FakeOutput {
            _guard: self.track_open(),
            played: self.played.clone(),
        }))
    }

    fn probe(&self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Remembers every LED write.
pub struct RecordingLeds {
    band_count: usize,
    history: Mutex<Vec<(Led, bool)>>,
    current: Mutex<HashMap<Led, bool>>,
}

impl RecordingLeds {
    pub fn new(band_count: usize) -> Self {
        Self {
            band_count,
            history: Mutex::new(Vec::new()),
            current: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_on(&self, led: Led) -> bool {
        self.current
            .lock()
            .unwrap()
            .get(&led)
            .copied()
            .unwrap_or(false)
    }

    /// Whether `led` was switched on at any point.
    pub fn was_on(&self, led: Led) -> bool {
        self.history
            .lock()
            .unwrap()
            .iter()
            .any(|&(l, on)| l == led && on)
    }

    /// Whether `led` was written at all, on or off.
    pub fn was_written(&self, led: Led) -> bool {
        self.history.lock().unwrap().iter().any(|&(l, _)| l == led)
    }

    pub fn clear(&self) {
        self.history.lock().unwrap().clear();
    }
}

impl LedDriver for RecordingLeds {
    fn set(&self, led: Led, on: bool) -> Result<(), GpioError> {
        self.history.lock().unwrap().push((led, on));
        self.current.lock().unwrap().insert(led, on);
        Ok(())
    }

    fn band_count(&self) -> usize {
        self.band_count
    }
}

/// Poll `condition` for up to five seconds. Returns whether it held.
pub fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

/// A context writing to a fresh temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn context(audio: Arc<FakeAudio>) -> (Context, Arc<RecordingLeds>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        output_path: dir.path().join("output.wav"),
        ..AppConfig::default()
    };
    let leds = Arc::new(RecordingLeds::new(config.analysis.band_thresholds_db.len()));
    let ctx = Context::new(config, leds.clone(), audio);
    (ctx, leds, dir)
}
