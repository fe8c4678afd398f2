// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Fixed-step time grid.
//!
//! Every quantized representation in the crate shares one step duration,
//! derived from a tempo and a subdivision of the quarter note.

use serde::{Deserialize, Serialize};

/// Tempo and subdivision that define the token grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTiming {
    /// Tempo in BPM
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Grid steps per quarter note (4 = sixteenth notes)
    #[serde(default = "default_steps_per_quarter")]
    pub steps_per_quarter: u32,
}

fn default_bpm() -> f64 {
    120.0
}
fn default_steps_per_quarter() -> u32 {
    4
}

impl Default for GridTiming {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            steps_per_quarter: default_steps_per_quarter(),
        }
    }
}

impl GridTiming {
    /// Create timing for a tempo and subdivision
    pub fn new(bpm: f64, steps_per_quarter: u32) -> Self {
        Self {
            bpm,
            steps_per_quarter,
        }
    }

    /// Duration of one quarter note in seconds
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one grid step in seconds
    pub fn step_duration(&self) -> f64 {
        self.beat_duration() / self.steps_per_quarter as f64
    }

    /// Start time of grid index `step` in seconds
    pub fn step_start(&self, step: usize) -> f64 {
        step as f64 * self.step_duration()
    }

    /// Number of steps needed to cover `end` seconds: `ceil(end / step)`
    pub fn steps_to_cover(&self, end: f64) -> usize {
        if end <= 0.0 {
            return 0;
        }
        (end / self.step_duration()).ceil() as usize
    }

    /// Convert seconds to MIDI file ticks at this tempo
    pub fn seconds_to_ticks(&self, seconds: f64, ppqn: u16) -> u64 {
        let beats = seconds / self.beat_duration();
        (beats * ppqn as f64).round().max(0.0) as u64
    }

    /// Microseconds per quarter note (SMF tempo meta value)
    pub fn micros_per_quarter(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }
}
