//! The recording file: 16-bit integer PCM via hound.

use super::StreamSpec;
use crate::error::PipelineError;
use hound::{WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub type Writer = WavWriter<BufWriter<File>>;
pub type Reader = WavReader<BufReader<File>>;

pub fn spec_for(stream: &StreamSpec) -> WavSpec {
    WavSpec {
        channels: stream.channels,
        sample_rate: stream.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Create (or truncate) the recording at `path`.
pub fn create(path: &Path, stream: &StreamSpec) -> Result<Writer, PipelineError> {
    Ok(WavWriter::create(path, spec_for(stream))?)
}

/// Open an existing recording. Only 16-bit integer files are accepted.
pub fn open(path: &Path) -> Result<Reader, PipelineError> {
    let reader = match WavReader::open(path) {
        Ok(reader) => reader,
        Err(hound::Error::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::MissingRecording(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(PipelineError::UnsupportedWav {
            bits: spec.bits_per_sample,
            format: spec.sample_format,
        });
    }

    Ok(reader)
}

/// Stream shape for playing back `reader`, chunked like capture.
pub fn stream_spec(reader: &Reader, chunk_frames: usize) -> StreamSpec {
    let spec = reader.spec();
    StreamSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        chunk_frames,
    }
}
