mod analyzer;
mod audio;
mod cli;
mod config;
mod consts;
mod context;
mod controller;
mod error;
mod gpio;
mod pipeline;
mod threshold;

#[cfg(test)]
mod testing;

use anyhow::Context as _;
use clap::Parser;
use crossbeam_channel::Sender;
use log::{debug, info};
use std::sync::Arc;

use crate::audio::{AudioBackend, CpalBackend};
use crate::config::AppConfig;
use crate::context::Context;
use crate::controller::{ControlEvent, Controller};
use crate::gpio::LedDriver;
use crate::gpio::console::{self, ConsoleLeds};

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    cli::init_logging(&args);

    if args.list_devices {
        let (inputs, outputs) =
            audio::cpal_backend::list_devices().context("Failed to list audio devices")?;
        println!("Input devices:");
        for name in inputs {
            println!("  {name}");
        }
        println!("Output devices:");
        for name in outputs {
            println!("  {name}");
        }
        return Ok(());
    }

    info!("Starting up...");

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut config).context("Invalid command-line override")?;

    // === Audio ===
    let audio: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new(&config.audio));
    audio.probe().context("Audio device unavailable")?;

    // === Input and LEDs ===
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let leds = open_gpio(&args, &config, events_tx.clone())?;

    {
        let events = events_tx.clone();
        ctrlc::set_handler(move || {
            let _ = events.send(ControlEvent::Shutdown);
        })
        .context("Failed to install the interrupt handler")?;
    }

    info!("Audio Recorder and Player");
    info!("Press the button to start recording, press again to stop");
    info!("Press once more to play back, and again to stop playback");
    info!("Initial record threshold: {} dB", config.thresholds.default_db);
    info!("Initial playback threshold: {} dB", config.thresholds.default_db);
    if config.analysis.enabled {
        info!("Frequency analysis enabled");
    } else {
        info!("Frequency analysis disabled");
    }
    info!("Press Ctrl+C to exit");

    // === Dispatcher ===
    let ctx = Arc::new(Context::new(config, leds.clone(), audio));
    let mut controller = Controller::new(ctx, events_tx);
    controller.run(&events_rx);

    debug!("Releasing GPIO...");
    leds.release();

    info!("Clean shutdown complete");
    Ok(())
}

#[cfg(feature = "rpi")]
fn open_gpio(
    args: &cli::Args,
    config: &AppConfig,
    events: Sender<ControlEvent>,
) -> anyhow::Result<Arc<dyn LedDriver>> {
    if args.simulate {
        return simulated_gpio(config, events);
    }

    let gpio = gpio::rpi::RpiGpio::open(&config.gpio, events).context("Failed to set up GPIO")?;
    Ok(Arc::new(gpio))
}

#[cfg(not(feature = "rpi"))]
fn open_gpio(
    args: &cli::Args,
    config: &AppConfig,
    events: Sender<ControlEvent>,
) -> anyhow::Result<Arc<dyn LedDriver>> {
    if !args.simulate {
        info!("Built without GPIO support, reading commands from stdin");
    }
    simulated_gpio(config, events)
}

fn simulated_gpio(
    config: &AppConfig,
    events: Sender<ControlEvent>,
) -> anyhow::Result<Arc<dyn LedDriver>> {
    console::spawn_stdin_input(events).context("Failed to start console input")?;
    Ok(Arc::new(ConsoleLeds::new(config.gpio.pins.band_leds.len())))
}
