pub mod capture;
pub mod playback;

use crate::context::Context;
use crate::error::PipelineError;
use std::fmt;
use std::sync::atomic::AtomicBool;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Record,
    Play,
}

impl Mode {
    pub fn other(self) -> Self {
        match self {
            Mode::Record => Mode::Play,
            Mode::Play => Mode::Record,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Record => write!(f, "recording"),
            Mode::Play => write!(f, "playback"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopReason {
    Requested,
    EndOfFile,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PipelineReport {
    pub mode: Mode,
    pub chunks: usize,
    pub reason: StopReason,
}

/// Run one pipeline to completion on the calling thread. `stop` is polled
/// once per chunk.
pub fn run(mode: Mode, ctx: &Context, stop: &AtomicBool) -> Result<PipelineReport, PipelineError> {
    match mode {
        Mode::Record => capture::run_capture(ctx, stop),
        Mode::Play => playback::run_playback(ctx, stop),
    }
}
