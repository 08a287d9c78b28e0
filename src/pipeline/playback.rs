use super::{Mode, PipelineReport, StopReason};
use crate::analyzer::{self, BandAnalyzer};
use crate::audio::{OutputStream, StreamSpec, wav};
use crate::context::Context;
use crate::error::PipelineError;
use crate::gpio::Led;
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};

/// Play the recording until it runs out or `stop` is set, driving the
/// playback LED from the RMS level and one LED per analysis band.
pub fn run_playback(ctx: &Context, stop: &AtomicBool) -> Result<PipelineReport, PipelineError> {
    let path = &ctx.config.output_path;
    let mut reader = wav::open(path)?;
    let spec = wav::stream_spec(&reader, ctx.config.audio.chunk_frames);

    let mut output = ctx.audio.open_output(&spec)?;
    let mut bands = BandAnalyzer::new(ctx.config.analysis.bands(), ctx.config.analysis.enabled);

    info!(
        "Playing {} ({} ch @ {} Hz)...",
        path.display(),
        spec.channels,
        spec.sample_rate
    );

    let result = playback_loop(ctx, stop, &mut reader, output.as_mut(), &mut bands, &spec)
        .and_then(|(chunks, reason)| {
            // Let the tail play out unless someone asked us to stop
            if reason == StopReason::EndOfFile {
                output.drain(stop)?;
            }
            Ok((chunks, reason))
        });

    drop(output);
    ctx.set_led(Led::Playback, false);
    if ctx.config.analysis.enabled {
        for i in 0..bands.bands().len() {
            ctx.set_led(Led::Band(i), false);
        }
    }

    let (chunks, reason) = result?;

    match reason {
        StopReason::EndOfFile => info!("Playback finished after {chunks} chunks"),
        StopReason::Requested => info!("Playback stopped after {chunks} chunks"),
    }

    Ok(PipelineReport {
        mode: Mode::Play,
        chunks,
        reason,
    })
}

fn playback_loop(
    ctx: &Context,
    stop: &AtomicBool,
    reader: &mut wav::Reader,
    output: &mut dyn OutputStream,
    bands: &mut BandAnalyzer,
    spec: &StreamSpec,
) -> Result<(usize, StopReason), PipelineError> {
    let mut samples = reader.samples::<i16>();
    let mut chunk = Vec::with_capacity(spec.chunk_samples());
    let mut chunks = 0;

    loop {
        if stop.load(Ordering::Acquire) {
            return Ok((chunks, StopReason::Requested));
        }

        chunk.clear();
        for sample in samples.by_ref().take(spec.chunk_samples()) {
            chunk.push(sample?);
        }
        if chunk.is_empty() {
            return Ok((chunks, StopReason::EndOfFile));
        }

        output.write_chunk(&chunk)?;

        let levels = bands.analyze(&chunk, spec.channels, spec.sample_rate);
        for (i, level) in levels.iter().enumerate() {
            ctx.set_led(Led::Band(i), level.is_lit());
            trace!("Band {}: {:.2} dB (magnitude {:.1})", i + 1, level.db, level.magnitude);
        }

        let db = analyzer::rms_db(&chunk);
        let threshold = ctx.thresholds.playback.get();
        ctx.set_led(Led::Playback, db > threshold as f32);

        trace!("Playback - DB: {db:.2} Threshold: {threshold}");
        chunks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capture::run_capture;
    use crate::testing::{self, FakeAudio, TONE_BAND};
    use std::sync::Arc;

    type Recorded = (
        Arc<FakeAudio>,
        Context,
        Arc<testing::RecordingLeds>,
        tempfile::TempDir,
    );

    fn record(chunks: usize, amplitude: f32) -> Recorded {
        let stop = Arc::new(AtomicBool::new(false));
        let audio = FakeAudio::new(amplitude).stop_after(chunks, stop.clone());
        let (ctx, leds, dir) = testing::context(audio.clone());
        run_capture(&ctx, &stop).unwrap();
        leds.clear();
        (audio, ctx, leds, dir)
    }

    #[test]
    fn test_round_trip_preserves_chunks_and_level() {
        let (audio, ctx, _leds, _dir) = record(6, 2000.0);
        let spec = ctx.capture_spec();

        let report = run_playback(&ctx, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.chunks, 6);
        assert_eq!(report.reason, StopReason::EndOfFile);

        let played = audio.played();
        assert_eq!(played.len(), 6);
        for (i, chunk) in played.iter().enumerate() {
            assert_eq!(chunk.len(), spec.chunk_samples());
            let source_db = analyzer::rms_db(&audio.source_chunk(i, &spec));
            let boost_db = 20.0 * ctx.config.audio.volume_boost.log10();
            let played_db = analyzer::rms_db(chunk);
            assert!(
                (played_db - (source_db + boost_db)).abs() < 0.05,
                "chunk {i}: {played_db} vs {source_db} + {boost_db}"
            );
        }
        assert_eq!(audio.open_streams(), 0);
    }

    #[test]
    fn test_leds_follow_level_and_band() {
        let (_audio, ctx, leds, _dir) = record(3, 2000.0);

        run_playback(&ctx, &AtomicBool::new(false)).unwrap();

        assert!(leds.was_on(Led::Playback));
        for i in 0..5 {
            assert_eq!(leds.was_on(Led::Band(i)), i == TONE_BAND, "band {i}");
            assert!(!leds.is_on(Led::Band(i)));
        }
        assert!(!leds.is_on(Led::Playback));
    }

    #[test]
    fn test_disabled_analysis_skips_band_leds() {
        let (_audio, mut ctx, leds, _dir) = record(3, 2000.0);
        ctx.config.analysis.enabled = false;

        run_playback(&ctx, &AtomicBool::new(false)).unwrap();

        assert!(leds.was_on(Led::Playback));
        for i in 0..5 {
            assert!(!leds.was_written(Led::Band(i)), "band {i} was driven");
        }
    }

    #[test]
    fn test_stop_request_ends_early() {
        let (audio, ctx, _leds, _dir) = record(4, 2000.0);

        let report = run_playback(&ctx, &AtomicBool::new(true)).unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.reason, StopReason::Requested);
        assert!(audio.played().is_empty());
        assert_eq!(audio.open_streams(), 0);
    }

    #[test]
    fn test_partial_last_chunk_is_played() {
        let (audio, ctx, _leds, _dir) = record(2, 2000.0);
        let spec = ctx.capture_spec();

        // Append half a chunk of silence
        let mut writer = hound::WavWriter::append(&ctx.config.output_path).unwrap();
        for _ in 0..spec.chunk_samples() / 2 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let report = run_playback(&ctx, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(audio.played()[2].len(), spec.chunk_samples() / 2);
    }

    #[test]
    fn test_missing_recording() {
        let audio = FakeAudio::new(2000.0);
        let (ctx, _leds, _dir) = testing::context(audio.clone());

        let err = run_playback(&ctx, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingRecording(_)));
        assert_eq!(audio.opened(), 0);
    }
}
