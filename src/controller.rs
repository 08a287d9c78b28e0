use crate::consts;
use crate::context::Context;
use crate::error::PipelineError;
use crate::gpio::{Direction, EncoderId, InputEvent};
use crate::pipeline::{self, Mode, PipelineReport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Everything the dispatcher reacts to, from any thread.
#[derive(Debug)]
pub enum ControlEvent {
    Input(InputEvent),
    Finished {
        mode: Mode,
        outcome: Result<PipelineReport, PipelineError>,
    },
    Shutdown,
}

impl From<InputEvent> for ControlEvent {
    fn from(event: InputEvent) -> Self {
        ControlEvent::Input(event)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransportState {
    Idle,
    Recording,
    Playing,
}

struct PipelineTask {
    mode: Mode,
    stop: Arc<AtomicBool>,
    /// Disconnects when the task thread exits.
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

enum Phase {
    Idle { next: Mode },
    Running(PipelineTask),
    /// Stop requested, waiting for the task's `Finished`.
    Stopping(PipelineTask),
}

/// Single owner of the transport. Button presses, encoder steps and
/// pipeline completions all arrive as [`ControlEvent`]s and are applied in
/// order, so a start can never race a stop.
pub struct Controller {
    ctx: Arc<Context>,
    events: Sender<ControlEvent>,
    phase: Phase,
    shutdown_grace: Duration,
}

impl Controller {
    /// `events` must feed the receiver passed to [`Controller::run`]; pipeline
    /// tasks report completion through it.
    pub fn new(ctx: Arc<Context>, events: Sender<ControlEvent>) -> Self {
        Self {
            ctx,
            events,
            phase: Phase::Idle { next: Mode::Record },
            shutdown_grace: Duration::from_millis(consts::SHUTDOWN_GRACE_MS),
        }
    }

    pub fn state(&self) -> TransportState {
        match &self.phase {
            Phase::Idle { .. } => TransportState::Idle,
            Phase::Running(task) | Phase::Stopping(task) => match task.mode {
                Mode::Record => TransportState::Recording,
                Mode::Play => TransportState::Playing,
            },
        }
    }

    /// Dispatch events until shutdown, then stop whatever is running.
    pub fn run(&mut self, events: &Receiver<ControlEvent>) {
        let poll = Duration::from_millis(self.ctx.config.idle_poll_ms);

        loop {
            match events.recv_timeout(poll) {
                Ok(event) => {
                    if !self.handle(event) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.shutdown();
    }

    /// Apply one event. Returns `false` once shutdown was requested.
    pub fn handle(&mut self, event: ControlEvent) -> bool {
        match event {
            ControlEvent::Input(InputEvent::ButtonPressed) => {
                self.on_button();
                debug!("Transport: {:?}", self.state());
            }
            ControlEvent::Input(InputEvent::EncoderEdge { encoder, clk, dt }) => {
                self.on_encoder(encoder, Direction::from_phases(clk, dt))
            }
            ControlEvent::Finished { mode, outcome } => self.on_finished(mode, outcome),
            ControlEvent::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    /// Stop any running task, then switch every LED off. A task stuck in a
    /// device call is left behind after `shutdown_grace`.
    /// Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle { next: Mode::Record });
        self.phase = match phase {
            Phase::Running(task) | Phase::Stopping(task) => {
                debug!("Waiting for {} task to stop", task.mode);
                task.stop.store(true, Ordering::Release);
                let next = task.mode.other();
                match task.done.recv_timeout(self.shutdown_grace) {
                    Err(RecvTimeoutError::Timeout) => warn!(
                        "{} task did not stop within {:?}, abandoning it",
                        task.mode, self.shutdown_grace
                    ),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => join(task),
                }
                Phase::Idle { next }
            }
            idle => idle,
        };

        if let Err(e) = self.ctx.leds.all_off() {
            warn!("Failed to switch LEDs off: {e}");
        }
    }

    fn on_button(&mut self) {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle { next: Mode::Record });
        self.phase = match phase {
            Phase::Idle { next } => self.start(next),
            Phase::Running(task) => {
                info!("Stopping {}...", task.mode);
                task.stop.store(true, Ordering::Release);
                Phase::Stopping(task)
            }
            Phase::Stopping(task) => {
                debug!("Ignoring button press while {} stops", task.mode);
                Phase::Stopping(task)
            }
        };
    }

    fn on_encoder(&self, encoder: EncoderId, direction: Direction) {
        let db = self.ctx.thresholds.get(encoder).step(direction);
        match encoder {
            EncoderId::Record => info!("Record threshold: {db} dB"),
            EncoderId::Playback => info!("Playback threshold: {db} dB"),
        }
    }

    fn on_finished(&mut self, mode: Mode, outcome: Result<PipelineReport, PipelineError>) {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle { next: Mode::Record });
        self.phase = match phase {
            Phase::Running(task) | Phase::Stopping(task) if task.mode == mode => {
                join(task);
                match outcome {
                    Ok(report) => debug!(
                        "{} ended after {} chunks ({:?})",
                        report.mode, report.chunks, report.reason
                    ),
                    Err(e) => error!("{mode} failed: {e}"),
                }
                Phase::Idle { next: mode.other() }
            }
            other => {
                warn!("Ignoring stale {mode} completion");
                other
            }
        };
    }

    fn start(&self, mode: Mode) -> Phase {
        let stop = Arc::new(AtomicBool::new(false));
        let ctx = self.ctx.clone();
        let events = self.events.clone();
        let task_stop = stop.clone();
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name(format!("{mode}"))
            .spawn(move || {
                let _done = done_tx;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    pipeline::run(mode, &ctx, &task_stop)
                }))
                .unwrap_or(Err(PipelineError::Panicked));
                let _ = events.send(ControlEvent::Finished { mode, outcome });
            });

        match spawned {
            Ok(handle) => {
                debug!("Started {mode} task");
                Phase::Running(PipelineTask {
                    mode,
                    stop,
                    done,
                    handle,
                })
            }
            Err(e) => {
                error!("Failed to spawn {mode} task: {e}");
                Phase::Idle { next: mode }
            }
        }
    }
}

fn join(task: PipelineTask) {
    if task.handle.join().is_err() {
        error!("{} task panicked", task.mode);
    }
}
