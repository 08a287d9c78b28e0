//! GPIO edges in, LED levels out.
//!
//! Input sources turn button and encoder edges into [`InputEvent`]s on a
//! channel. LEDs are driven through [`LedDriver`] so pipelines never touch
//! pins directly.

pub mod console;
#[cfg(feature = "rpi")]
pub mod rpi;

use crate::error::GpioError;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncoderId {
    Record,
    Playback,
}

/// One debounced edge from the input layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputEvent {
    ButtonPressed,
    /// CLK changed; `clk` and `dt` are the line levels sampled at that moment.
    EncoderEdge { encoder: EncoderId, clk: bool, dt: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// Quadrature decode of a single CLK edge.
    pub fn from_phases(clk: bool, dt: bool) -> Self {
        if clk != dt {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    }

    pub fn step(self) -> i32 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Led {
    Record,
    Playback,
    Band(usize),
}

impl std::fmt::Display for Led {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Led::Record => write!(f, "record"),
            Led::Playback => write!(f, "playback"),
            Led::Band(i) => write!(f, "band {}", i + 1),
        }
    }
}

pub trait LedDriver: Send + Sync {
    fn set(&self, led: Led, on: bool) -> Result<(), GpioError>;

    fn band_count(&self) -> usize;

    /// Return the pins to their reset state. Safe to call more than once.
    fn release(&self) {}

    fn all_off(&self) -> Result<(), GpioError> {
        self.set(Led::Record, false)?;
        self.set(Led::Playback, false)?;
        for i in 0..self.band_count() {
            self.set(Led::Band(i), false)?;
        }
        Ok(())
    }
}

/// Physical header pin to BCM GPIO number on the 40-pin Raspberry Pi header.
/// Power, ground and out-of-range pins map to `None`.
pub fn board_to_bcm(pin: u8) -> Option<u8> {
    let bcm = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        27 => 0,
        28 => 1,
        29 => 5,
        31 => 6,
        32 => 12,
        33 => 13,
        35 => 19,
        36 => 16,
        37 => 26,
        38 => 20,
        40 => 21,
        _ => return None,
    };
    Some(bcm)
}

#[cfg_attr(not(feature = "rpi"), allow(dead_code))]
pub fn bcm_pin(board: u8) -> Result<u8, GpioError> {
    board_to_bcm(board).ok_or(GpioError::InvalidPin(board))
}
