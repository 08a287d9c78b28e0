/// Sample rate in Hz. Standard CD quality is 44100 Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Number of frames read or written per pipeline iteration.
/// 1024 frames at 44.1kHz = ~23ms of audio, which is also the worst-case
/// latency between a stop request and the pipeline noticing it.
pub const CHUNK_FRAMES: usize = 1024;

/// Channel count for capture. CoreAudio built-in mics are mono,
/// ALSA boards are usually wired stereo.
pub const CHANNELS: u16 = if cfg!(target_os = "macos") { 1 } else { 2 };

/// Linear gain applied to captured samples before they are written.
/// Products outside the i16 range saturate.
pub const VOLUME_BOOST: f32 = 5.0;

/// Largest positive i16 sample, used as 0 dBFS.
pub const FULL_SCALE: f32 = 32767.0;

/// Reported level for silence (zero amplitude, or a band with no bins).
pub const FLOOR_DB: f32 = -100.0;

/// Threshold range the encoders can reach, in dB.
pub const THRESHOLD_MIN_DB: i32 = -50;
pub const THRESHOLD_MAX_DB: i32 = -10;

/// Threshold both encoders start from on every launch.
pub const DEFAULT_THRESHOLD_DB: i32 = -30;

/// Fixed analysis bands as [low, high) in Hz.
/// Low, Low-Mid, Mid, High-Mid, High
pub const FREQ_BANDS: [(f32, f32); 5] = [
    (20.0, 200.0),
    (200.0, 800.0),
    (800.0, 2000.0),
    (2000.0, 8000.0),
    (8000.0, 20000.0),
];

/// Level a band must exceed to light its LED.
pub const BAND_THRESHOLD_DB: f32 = -30.0;

/// Contact bounce suppression for the push button.
pub const BUTTON_DEBOUNCE_MS: u64 = 300;

/// Contact bounce suppression for the encoder CLK lines.
pub const ENCODER_DEBOUNCE_MS: u64 = 50;

/// How often the dispatcher wakes up when no events arrive.
pub const IDLE_POLL_MS: u64 = 100;

/// How long shutdown waits for a pipeline task before leaving it behind.
/// Longer than the device stall timeout so a stuck stream usually fails first.
pub const SHUTDOWN_GRACE_MS: u64 = 3000;

/// The single recording artifact. Overwritten by every capture.
pub const OUTPUT_FILE: &str = "output.wav";
