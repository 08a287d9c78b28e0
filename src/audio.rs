pub mod cpal_backend;
pub mod wav;

pub use cpal_backend::CpalBackend;

use crate::error::AudioError;
use std::sync::atomic::AtomicBool;

/// Shape of a PCM stream as the pipelines see it: interleaved i16.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StreamSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub chunk_frames: usize,
}

impl StreamSpec {
    pub fn chunk_samples(&self) -> usize {
        self.chunk_frames * self.channels as usize
    }
}

/// Capture side of a device. Dropping it releases the device.
pub trait InputStream {
    /// Block until `buf` is completely filled.
    fn read_chunk(&mut self, buf: &mut [i16]) -> Result<(), AudioError>;
}

/// Playback side of a device. Dropping it releases the device.
pub trait OutputStream {
    /// Queue samples, blocking while the device is behind.
    fn write_chunk(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    /// Block until everything queued has been played, or until `stop` is set.
    fn drain(&mut self, _stop: &AtomicBool) -> Result<(), AudioError> {
        Ok(())
    }
}

pub trait AudioBackend: Send + Sync {
    fn open_input(&self, spec: &StreamSpec) -> Result<Box<dyn InputStream>, AudioError>;

    fn open_output(&self, spec: &StreamSpec) -> Result<Box<dyn OutputStream>, AudioError>;

    /// Check that both devices exist without opening streams.
    fn probe(&self) -> Result<(), AudioError>;
}
