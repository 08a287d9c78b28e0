use super::{Mode, PipelineReport, StopReason};
use crate::analyzer;
use crate::audio::{InputStream, StreamSpec, wav};
use crate::context::Context;
use crate::error::PipelineError;
use crate::gpio::Led;
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};

/// Record boosted input to the output file until `stop` is set.
///
/// The input device is released and the file finalized even when a read or
/// write fails part way; the first error is returned afterwards.
pub fn run_capture(ctx: &Context, stop: &AtomicBool) -> Result<PipelineReport, PipelineError> {
    let spec = ctx.capture_spec();
    let path = &ctx.config.output_path;

    let mut input = ctx.audio.open_input(&spec)?;
    let mut writer = wav::create(path, &spec)?;

    info!("Recording to {}...", path.display());

    let result = capture_loop(ctx, stop, input.as_mut(), &mut writer, &spec);

    drop(input);
    ctx.set_led(Led::Record, false);
    let finalized = writer.finalize();

    let chunks = result?;
    finalized?;

    info!("Recording stopped after {chunks} chunks");

    Ok(PipelineReport {
        mode: Mode::Record,
        chunks,
        reason: StopReason::Requested,
    })
}

fn capture_loop(
    ctx: &Context,
    stop: &AtomicBool,
    input: &mut dyn InputStream,
    writer: &mut wav::Writer,
    spec: &StreamSpec,
) -> Result<usize, PipelineError> {
    let gain = ctx.config.audio.volume_boost;
    let mut chunk = vec![0i16; spec.chunk_samples()];
    let mut chunks = 0;

    while !stop.load(Ordering::Acquire) {
        input.read_chunk(&mut chunk)?;
        analyzer::apply_gain(&mut chunk, gain);

        for &sample in &chunk {
            writer.write_sample(sample)?;
        }

        let db = analyzer::rms_db(&chunk);
        let threshold = ctx.thresholds.record.get();
        ctx.set_led(Led::Record, db > threshold as f32);

        trace!("Recording - DB: {db:.2} Threshold: {threshold}");
        chunks += 1;
    }

    Ok(chunks)
}
