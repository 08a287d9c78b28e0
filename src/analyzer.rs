use rustfft::{FftPlanner, num_complex::Complex};

use crate::consts;

/// A fixed analysis band, [low_hz, high_hz).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FrequencyBand {
    pub low_hz: f32,
    pub high_hz: f32,
    pub threshold_db: f32,
}

impl FrequencyBand {
    pub fn contains(&self, freq_hz: f32) -> bool {
        freq_hz >= self.low_hz && freq_hz < self.high_hz
    }
}

/// Average magnitude of one band for one chunk.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BandLevel {
    pub band: FrequencyBand,
    pub magnitude: f32,
    pub db: f32,
}

impl BandLevel {
    pub fn is_lit(&self) -> bool {
        self.db > self.band.threshold_db
    }
}

/// Convert a linear amplitude ratio (1.0 = full scale) to dBFS.
/// Zero, negative and non-finite ratios report the floor instead of
/// taking a logarithm.
pub fn ratio_to_db(ratio: f32) -> f32 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return consts::FLOOR_DB;
    }
    (20.0 * ratio.log10()).max(consts::FLOOR_DB)
}

/// Root-mean-square of raw i16 samples, normalized to full scale.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();

    (rms / f64::from(consts::FULL_SCALE)) as f32
}

/// RMS level of a chunk in dBFS, never below `consts::FLOOR_DB`.
pub fn rms_db(samples: &[i16]) -> f32 {
    ratio_to_db(rms(samples))
}

/// Multiply every sample by `gain`. The product saturates at the i16
/// range and truncates toward zero.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
    for sample in samples.iter_mut() {
        *sample = (f32::from(*sample) * gain) as i16;
    }
}

/// Average interleaved frames down to one channel.
pub fn downmix(samples: &[i16], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    samples
        .chunks(channels)
        .map(|frame| frame.iter().map(|&s| f32::from(s)).sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Frequency of DFT bin `k` for an `n`-point transform. Bins past the
/// midpoint are negative frequencies.
fn bin_frequency(k: usize, n: usize, sample_rate: f32) -> f32 {
    let signed = if k < n.div_ceil(2) {
        k as f32
    } else {
        k as f32 - n as f32
    };
    signed * sample_rate / n as f32
}

/// Splits each chunk's spectrum into the configured bands.
pub struct BandAnalyzer {
    bands: Vec<FrequencyBand>,
    enabled: bool,
    fft_planner: FftPlanner<f32>,
}

impl BandAnalyzer {
    pub fn new(bands: Vec<FrequencyBand>, enabled: bool) -> Self {
        Self {
            bands,
            enabled,
            fft_planner: FftPlanner::new(),
        }
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Per-band levels of one interleaved chunk. Empty when analysis is
    /// disabled or the chunk holds no samples.
    pub fn analyze(&mut self, samples: &[i16], channels: u16, sample_rate: u32) -> Vec<BandLevel> {
        if !self.enabled {
            return Vec::new();
        }

        let mono = downmix(samples, channels);
        if mono.is_empty() {
            return Vec::new();
        }

        // Prepare data for FFT
        let mut complex_buffer: Vec<Complex<f32>> =
            mono.iter().map(|&x| Complex::new(x, 0.0)).collect();

        let n = complex_buffer.len();
        let fft = self.fft_planner.plan_fft_forward(n);
        fft.process(&mut complex_buffer);

        let sample_rate = sample_rate as f32;

        self.bands
            .iter()
            .map(|&band| {
                let (sum, count) = complex_buffer
                    .iter()
                    .enumerate()
                    .filter(|&(k, _)| band.contains(bin_frequency(k, n, sample_rate)))
                    .fold((0.0f32, 0usize), |(sum, count), (_, c)| {
                        (sum + c.norm(), count + 1)
                    });

                let magnitude = if count > 0 { sum / count as f32 } else { 0.0 };

                BandLevel {
                    band,
                    magnitude,
                    db: ratio_to_db(magnitude / consts::FULL_SCALE),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::testing::tone;

    #[test]
    fn test_silence_reports_floor() {
        assert_eq!(rms_db(&[0; 2048]), consts::FLOOR_DB);
        assert_eq!(rms_db(&[]), consts::FLOOR_DB);
        assert_eq!(ratio_to_db(-0.5), consts::FLOOR_DB);
        assert_eq!(ratio_to_db(f32::NAN), consts::FLOOR_DB);
    }

    #[test]
    fn test_full_scale_is_zero_db() {
        let db = rms_db(&[i16::MAX; 512]);
        assert!(db.abs() < 0.01, "{db}");
    }

    #[test]
    fn test_rms_db_is_monotonic_in_amplitude() {
        let mut previous = f32::NEG_INFINITY;
        for amplitude in (0..=i16::MAX).step_by(97) {
            let db = rms_db(&[amplitude; 256]);
            assert!(!db.is_nan());
            assert!(db >= previous, "{amplitude}: {db} < {previous}");
            previous = db;
        }
    }

    #[test]
    fn test_gain_saturates() {
        let mut samples = [1000, -1000, 20000, -20000, 0, 3];
        apply_gain(&mut samples, 5.0);
        assert_eq!(samples, [5000, -5000, i16::MAX, i16::MIN, 0, 15]);
    }

    #[test]
    fn test_downmix_averages_frames() {
        assert_eq!(downmix(&[100, 300, -50, 50], 2), vec![200.0, 0.0]);
        assert_eq!(downmix(&[7, 8], 1), vec![7.0, 8.0]);
    }

    #[test]
    fn test_bin_frequencies_fold_negative() {
        assert_eq!(bin_frequency(0, 8, 800.0), 0.0);
        assert_eq!(bin_frequency(3, 8, 800.0), 300.0);
        assert_eq!(bin_frequency(4, 8, 800.0), -400.0);
        assert_eq!(bin_frequency(7, 8, 800.0), -100.0);
    }

    #[test]
    fn test_pure_tone_lights_only_its_band() {
        // Bin 12 of a 1024-point transform at 44.1kHz: ~517 Hz, Low-Mid band
        let freq = 12.0 * 44100.0 / 1024.0;
        let samples = tone(freq, 8000.0, 1024, 1, 44100);

        let mut analyzer = BandAnalyzer::new(AnalysisConfig::default().bands(), true);
        let levels = analyzer.analyze(&samples, 1, 44100);

        assert_eq!(levels.len(), 5);
        for (i, level) in levels.iter().enumerate() {
            if i == 1 {
                assert!(level.is_lit(), "tone band at {} dB", level.db);
                assert!(level.db > 0.0);
            } else {
                assert!(!level.is_lit(), "band {i} at {} dB", level.db);
                assert!(level.db < -50.0, "band {i} at {} dB", level.db);
            }
        }
    }

    #[test]
    fn test_stereo_tone_uses_frame_rate() {
        // Bin 140 of 1024 frames: ~6029 Hz, High-Mid band
        let freq = 140.0 * 44100.0 / 1024.0;
        let samples = tone(freq, 8000.0, 1024, 2, 44100);

        let mut analyzer = BandAnalyzer::new(AnalysisConfig::default().bands(), true);
        let lit: Vec<bool> = analyzer
            .analyze(&samples, 2, 44100)
            .iter()
            .map(BandLevel::is_lit)
            .collect();

        assert_eq!(lit, vec![false, false, false, true, false]);
    }

    #[test]
    fn test_silence_bands_report_floor() {
        let mut analyzer = BandAnalyzer::new(AnalysisConfig::default().bands(), true);
        for level in analyzer.analyze(&[0; 1024], 1, 44100) {
            assert_eq!(level.db, consts::FLOOR_DB);
            assert!(!level.is_lit());
        }
    }

    #[test]
    fn test_disabled_analysis_is_empty() {
        let samples = tone(440.0, 8000.0, 1024, 1, 44100);
        let mut analyzer = BandAnalyzer::new(AnalysisConfig::default().bands(), false);
        assert!(analyzer.analyze(&samples, 1, 44100).is_empty());
    }

    #[test]
    fn test_band_without_bins_reports_floor() {
        // 8 points at 8kHz gives 1kHz bins, none inside 20..200 Hz
        let mut analyzer = BandAnalyzer::new(AnalysisConfig::default().bands(), true);
        let levels = analyzer.analyze(&[1000; 8], 1, 8000);
        assert_eq!(levels[0].magnitude, 0.0);
        assert_eq!(levels[0].db, consts::FLOOR_DB);
    }
}
