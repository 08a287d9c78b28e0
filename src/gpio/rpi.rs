//! Raspberry Pi header access through rppal.

use super::{EncoderId, InputEvent, Led, LedDriver, bcm_pin};
use crate::config::GpioConfig;
use crate::controller::ControlEvent;
use crate::error::GpioError;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct LedPins {
    record: OutputPin,
    playback: OutputPin,
    bands: Vec<OutputPin>,
}

impl LedPins {
    fn pin_mut(&mut self, led: Led) -> Option<&mut OutputPin> {
        match led {
            Led::Record => Some(&mut self.record),
            Led::Playback => Some(&mut self.playback),
            Led::Band(i) => self.bands.get_mut(i),
        }
    }
}

/// Owns every pin the recorder uses. Interrupt callbacks feed the
/// dispatcher channel; dropping (or `release`) resets the pins.
pub struct RpiGpio {
    leds: Mutex<Option<LedPins>>,
    inputs: Mutex<Vec<InputPin>>,
    band_count: usize,
    released: AtomicBool,
}

impl RpiGpio {
    pub fn open(config: &GpioConfig, sink: Sender<ControlEvent>) -> Result<Self, GpioError> {
        let gpio = Gpio::new()?;
        let pins = &config.pins;

        let output = |board: u8| -> Result<OutputPin, GpioError> {
            Ok(gpio.get(bcm_pin(board)?)?.into_output_low())
        };

        let leds = LedPins {
            record: output(pins.record_led)?,
            playback: output(pins.playback_led)?,
            bands: pins
                .band_leds
                .iter()
                .map(|&board| output(board))
                .collect::<Result<_, _>>()?,
        };
        let band_count = leds.bands.len();

        let mut inputs = Vec::new();

        // Active-low button, pulled up
        let mut button = gpio.get(bcm_pin(pins.button)?)?.into_input_pullup();
        let tx = sink.clone();
        button.set_async_interrupt(
            Trigger::FallingEdge,
            Some(config.button_debounce),
            move |_event: Event| {
                let _ = tx.send(ControlEvent::Input(InputEvent::ButtonPressed));
            },
        )?;
        inputs.push(button);

        for encoder in [EncoderId::Record, EncoderId::Playback] {
            let lines = pins.encoder(encoder);
            let dt = Arc::new(gpio.get(bcm_pin(lines.dt)?)?.into_input_pullup());
            let mut clk = gpio.get(bcm_pin(lines.clk)?)?.into_input_pullup();

            let tx = sink.clone();
            clk.set_async_interrupt(
                Trigger::Both,
                Some(config.encoder_debounce),
                move |event: Event| {
                    let edge = InputEvent::EncoderEdge {
                        encoder,
                        clk: event.trigger == Trigger::RisingEdge,
                        dt: dt.is_high(),
                    };
                    let _ = tx.send(ControlEvent::Input(edge));
                },
            )?;
            inputs.push(clk);
        }

        info!(
            "GPIO ready: button on pin {}, encoders on pins {:?}/{:?}",
            pins.button, pins.record_encoder, pins.playback_encoder
        );

        Ok(Self {
            leds: Mutex::new(Some(leds)),
            inputs: Mutex::new(inputs),
            band_count,
            released: AtomicBool::new(false),
        })
    }
}

impl LedDriver for RpiGpio {
    fn set(&self, led: Led, on: bool) -> Result<(), GpioError> {
        let mut leds = self.leds.lock().unwrap();
        if let Some(pin) = leds.as_mut().and_then(|pins| pins.pin_mut(led)) {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        Ok(())
    }

    fn band_count(&self) -> usize {
        self.band_count
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("Releasing GPIO pins");
        for pin in self.inputs.lock().unwrap().iter_mut() {
            if let Err(e) = pin.clear_async_interrupt() {
                warn!("Failed to clear interrupt on GPIO {}: {e}", pin.pin());
            }
        }
        self.inputs.lock().unwrap().clear();

        // OutputPin resets to its original mode on drop
        if let Some(mut pins) = self.leds.lock().unwrap().take() {
            pins.record.set_low();
            pins.playback.set_low();
            for pin in pins.bands.iter_mut() {
                pin.set_low();
            }
        }
        info!("GPIO released");
    }
}

impl Drop for RpiGpio {
    fn drop(&mut self) {
        self.release();
    }
}
