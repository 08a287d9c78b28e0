use super::{AudioBackend, InputStream, OutputStream, StreamSpec};
use crate::config::AudioConfig;
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Callback blocks buffered between the capture callback and the pipeline.
const INPUT_QUEUE_BLOCKS: usize = 64;

/// Chunks the pipeline may run ahead of the playback callback.
const OUTPUT_QUEUE_CHUNKS: usize = 4;

/// How long a stream may make no progress before it is treated as dead.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens streams on the cpal default host. Devices are looked up on every
/// open so the backend itself can be shared across threads.
pub struct CpalBackend {
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalBackend {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            output_device: config.output_device.clone(),
        }
    }

    fn input_device(&self, host: &cpal::Host) -> Result<cpal::Device, AudioError> {
        match &self.input_device {
            Some(name) => find_device(host.input_devices()?, name),
            None => host
                .default_input_device()
                .ok_or(AudioError::NoDevice("input")),
        }
    }

    fn output_device(&self, host: &cpal::Host) -> Result<cpal::Device, AudioError> {
        match &self.output_device {
            Some(name) => find_device(host.output_devices()?, name),
            None => host
                .default_output_device()
                .ok_or(AudioError::NoDevice("output")),
        }
    }
}

fn find_device(
    mut devices: impl Iterator<Item = cpal::Device>,
    name: &str,
) -> Result<cpal::Device, AudioError> {
    devices
        .find(|d| d.name().ok().as_deref() == Some(name))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

fn stream_config(spec: &StreamSpec) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

/// Input and output device names of the default host.
pub fn list_devices() -> Result<(Vec<String>, Vec<String>), AudioError> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    let outputs = host
        .output_devices()?
        .filter_map(|d| d.name().ok())
        .collect();
    Ok((inputs, outputs))
}

impl AudioBackend for CpalBackend {
    fn open_input(&self, spec: &StreamSpec) -> Result<Box<dyn InputStream>, AudioError> {
        let host = cpal::default_host();
        let device = self.input_device(&host)?;
        let sample_format = device.default_input_config()?.sample_format();
        let config = stream_config(spec);

        debug!(
            "Opening input '{}' ({sample_format:?}, {} ch @ {} Hz)",
            device.name().unwrap_or_default(),
            config.channels,
            spec.sample_rate
        );

        let (tx, rx) = bounded(INPUT_QUEUE_BLOCKS);
        let overruns = Arc::new(AtomicUsize::new(0));

        let stream = match sample_format {
            SampleFormat::F32 => build_input::<f32>(&device, &config, tx, overruns.clone())?,
            SampleFormat::I16 => build_input::<i16>(&device, &config, tx, overruns.clone())?,
            SampleFormat::U16 => build_input::<u16>(&device, &config, tx, overruns.clone())?,
            other => return Err(AudioError::UnsupportedFormat(other)),
        };

        stream.play()?;

        Ok(Box::new(CpalInput {
            _stream: stream,
            blocks: rx,
            pending: VecDeque::new(),
            overruns,
        }))
    }

    fn open_output(&self, spec: &StreamSpec) -> Result<Box<dyn OutputStream>, AudioError> {
        let host = cpal::default_host();
        let device = self.output_device(&host)?;
        let sample_format = device.default_output_config()?.sample_format();
        let config = stream_config(spec);

        debug!(
            "Opening output '{}' ({sample_format:?}, {} ch @ {} Hz)",
            device.name().unwrap_or_default(),
            config.channels,
            spec.sample_rate
        );

        let (tx, rx) = bounded(OUTPUT_QUEUE_CHUNKS);
        let queued = Arc::new(AtomicUsize::new(0));

        let stream = match sample_format {
            SampleFormat::F32 => build_output::<f32>(&device, &config, rx, queued.clone())?,
            SampleFormat::I16 => build_output::<i16>(&device, &config, rx, queued.clone())?,
            SampleFormat::U16 => build_output::<u16>(&device, &config, rx, queued.clone())?,
            other => return Err(AudioError::UnsupportedFormat(other)),
        };

        stream.play()?;

        Ok(Box::new(CpalOutput {
            _stream: stream,
            blocks: tx,
            queued,
        }))
    }

    fn probe(&self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let input = self.input_device(&host)?;
        let output = self.output_device(&host)?;
        debug!(
            "Audio devices: input '{}', output '{}'",
            input.name().unwrap_or_default(),
            output.name().unwrap_or_default()
        );
        Ok(())
    }
}

struct CpalInput {
    _stream: cpal::Stream,
    blocks: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    overruns: Arc<AtomicUsize>,
}

impl InputStream for CpalInput {
    fn read_chunk(&mut self, buf: &mut [i16]) -> Result<(), AudioError> {
        while self.pending.len() < buf.len() {
            let block = match self.blocks.recv_timeout(STALL_TIMEOUT) {
                Ok(block) => block,
                Err(RecvTimeoutError::Timeout) => return Err(AudioError::Stalled),
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::StreamClosed),
            };
            self.pending.extend(block);
        }

        let n = buf.len();
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }

        let dropped = self.overruns.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("Input overrun, dropped {dropped} callback blocks");
        }

        Ok(())
    }
}

struct CpalOutput {
    _stream: cpal::Stream,
    blocks: Sender<Vec<i16>>,
    queued: Arc<AtomicUsize>,
}

impl OutputStream for CpalOutput {
    fn write_chunk(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        self.queued.fetch_add(samples.len(), Ordering::AcqRel);
        self.blocks
            .send_timeout(samples.to_vec(), STALL_TIMEOUT)
            .map_err(|e| {
                self.queued.fetch_sub(samples.len(), Ordering::AcqRel);
                match e {
                    SendTimeoutError::Timeout(_) => AudioError::Stalled,
                    SendTimeoutError::Disconnected(_) => AudioError::StreamClosed,
                }
            })
    }

    fn drain(&mut self, stop: &AtomicBool) -> Result<(), AudioError> {
        wait_drained(&self.queued, stop, STALL_TIMEOUT)
    }
}

/// Wait for the callback to consume `queued` samples. Returns early on
/// `stop`, and fails once the count has not moved for `stall`.
fn wait_drained(
    queued: &AtomicUsize,
    stop: &AtomicBool,
    stall: Duration,
) -> Result<(), AudioError> {
    let mut last = queued.load(Ordering::Acquire);
    let mut since = Instant::now();

    while last > 0 {
        if stop.load(Ordering::Acquire) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(5));

        let now = queued.load(Ordering::Acquire);
        if now != last {
            last = now;
            since = Instant::now();
        } else if since.elapsed() >= stall {
            return Err(AudioError::Stalled);
        }
    }
    Ok(())
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Sender<Vec<i16>>,
    overruns: Arc<AtomicUsize>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample,
    i16: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let block: Vec<i16> = data.iter().map(|&s| s.to_sample()).collect();
            if blocks.try_send(block).is_err() {
                overruns.fetch_add(1, Ordering::Relaxed);
            }
        },
        |err| error!("Input stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Receiver<Vec<i16>>,
    queued: Arc<AtomicUsize>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + FromSample<i16>,
{
    let mut pending: VecDeque<i16> = VecDeque::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for out in data.iter_mut() {
                if pending.is_empty() {
                    if let Ok(block) = blocks.try_recv() {
                        pending.extend(block);
                    }
                }

                // Underrun plays silence
                let sample = match pending.pop_front() {
                    Some(sample) => {
                        queued.fetch_sub(1, Ordering::AcqRel);
                        sample
                    }
                    None => 0,
                };
                *out = sample.to_sample();
            }
        },
        |err| error!("Output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
