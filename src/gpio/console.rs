//! Hardware-free stand-ins: LEDs become log lines, stdin becomes the button
//! and the encoders.

use super::{EncoderId, InputEvent, Led, LedDriver};
use crate::controller::ControlEvent;
use crate::error::GpioError;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

struct LedLevels {
    record: bool,
    playback: bool,
    bands: Vec<bool>,
}

/// Logs LED changes instead of driving pins.
pub struct ConsoleLeds {
    levels: Mutex<LedLevels>,
}

impl ConsoleLeds {
    pub fn new(band_count: usize) -> Self {
        Self {
            levels: Mutex::new(LedLevels {
                record: false,
                playback: false,
                bands: vec![false; band_count],
            }),
        }
    }
}

impl LedDriver for ConsoleLeds {
    fn set(&self, led: Led, on: bool) -> Result<(), GpioError> {
        let mut levels = self.levels.lock().unwrap();
        let slot = match led {
            Led::Record => &mut levels.record,
            Led::Playback => &mut levels.playback,
            Led::Band(i) => match levels.bands.get_mut(i) {
                Some(slot) => slot,
                None => return Ok(()),
            },
        };

        if *slot != on {
            *slot = on;
            debug!("LED {led} {}", if on { "on" } else { "off" });
        }
        Ok(())
    }

    fn band_count(&self) -> usize {
        self.levels.lock().unwrap().bands.len()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Command {
    Input(InputEvent),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let encoder_step = |encoder, clockwise: bool| {
        // CLK high with DT low decodes clockwise, both high counter-clockwise
        Command::Input(InputEvent::EncoderEdge {
            encoder,
            clk: true,
            dt: !clockwise,
        })
    };

    match line.trim() {
        "" | "b" => Some(Command::Input(InputEvent::ButtonPressed)),
        "r+" => Some(encoder_step(EncoderId::Record, true)),
        "r-" => Some(encoder_step(EncoderId::Record, false)),
        "p+" => Some(encoder_step(EncoderId::Playback, true)),
        "p-" => Some(encoder_step(EncoderId::Playback, false)),
        "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Spawn a thread that turns stdin lines into control events until stdin
/// closes, `q` is entered, or the dispatcher goes away.
pub fn spawn_stdin_input(sink: Sender<ControlEvent>) -> std::io::Result<JoinHandle<()>> {
    info!("Console input: <enter>/b = button, r+/r- and p+/p- = encoders, q = quit");

    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {e}");
                        break;
                    }
                };

                let event = match parse_command(&line) {
                    Some(Command::Input(event)) => ControlEvent::Input(event),
                    Some(Command::Quit) => ControlEvent::Shutdown,
                    None => {
                        warn!("Unknown command: {:?}", line.trim());
                        continue;
                    }
                };

                let quit = matches!(event, ControlEvent::Shutdown);
                if sink.send(event).is_err() || quit {
                    break;
                }
            }
            debug!("Console input closed");
        })
}
