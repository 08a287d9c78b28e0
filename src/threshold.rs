use crate::consts;
use crate::gpio::{Direction, EncoderId};
use std::sync::atomic::{AtomicI32, Ordering};

/// A dB threshold shared between the encoder dispatcher and a running
/// pipeline. Always within [`consts::THRESHOLD_MIN_DB`, `consts::THRESHOLD_MAX_DB`].
#[derive(Debug)]
pub struct Threshold {
    value: AtomicI32,
}

impl Threshold {
    pub fn new(initial_db: i32) -> Self {
        Self {
            value: AtomicI32::new(clamp_db(initial_db)),
        }
    }

    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Move one dB in `direction`, stopping at the range limits.
    /// Returns the new value.
    pub fn step(&self, direction: Direction) -> i32 {
        let delta = direction.step();
        let previous = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |db| {
                Some(clamp_db(db + delta))
            })
            .unwrap_or_else(|db| db);
        clamp_db(previous + delta)
    }
}

fn clamp_db(db: i32) -> i32 {
    db.clamp(consts::THRESHOLD_MIN_DB, consts::THRESHOLD_MAX_DB)
}

#[derive(Debug)]
pub struct ThresholdPair {
    pub record: Threshold,
    pub playback: Threshold,
}

impl ThresholdPair {
    pub fn new(initial_db: i32) -> Self {
        Self {
            record: Threshold::new(initial_db),
            playback: Threshold::new(initial_db),
        }
    }

    pub fn get(&self, encoder: EncoderId) -> &Threshold {
        match encoder {
            EncoderId::Record => &self.record,
            EncoderId::Playback => &self.playback,
        }
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self::new(consts::DEFAULT_THRESHOLD_DB)
    }
}
