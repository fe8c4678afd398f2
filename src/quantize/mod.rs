// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event quantizer.
//!
//! Converts continuous-time note events into a fixed-step grid. Both the
//! monophonic bass grid and the polyphonic chord grid come out of the same
//! boundary sweep; only the state update applied at each note boundary
//! differs (see [`SweepPolicy`]).
//!
//! Grid index `s` covers `[s*step, (s+1)*step)` and is sampled at its left
//! edge: every onset/offset with `time <= s*step` is applied before the
//! value for `s` is recorded.

use std::collections::BTreeSet;

use crate::codec::{ChordFrame, PitchRange, Token};
use crate::timing::GridTiming;

/// A note in continuous time (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Onset time in seconds
    pub start: f64,
    /// Release time in seconds (`end >= start`)
    pub end: f64,
    /// MIDI pitch; may leave 0..=127 after transposition
    pub pitch: i32,
}

impl Event {
    /// Create an event
    pub fn new(start: f64, end: f64, pitch: i32) -> Self {
        Self { start, end, pitch }
    }

    /// Same note shifted by `semitones`
    pub fn transposed(&self, semitones: i32) -> Self {
        Self {
            pitch: self.pitch + semitones,
            ..*self
        }
    }
}

/// Shift every event by `semitones`
pub fn transpose(events: &[Event], semitones: i32) -> Vec<Event> {
    events.iter().map(|e| e.transposed(semitones)).collect()
}

/// One note boundary: an onset or an offset
#[derive(Debug, Clone, Copy, PartialEq)]
struct Boundary {
    time: f64,
    pitch: i32,
    onset: bool,
}

/// State update applied at note boundaries during the sweep
pub trait SweepPolicy {
    /// Value recorded for each grid step
    type Frame;

    /// A note starts
    fn onset(&mut self, pitch: i32);

    /// A note ends
    fn offset(&mut self, pitch: i32);

    /// Value for the current step
    fn frame(&self) -> Self::Frame;
}

/// Monophonic policy: last onset wins, only the held pitch's own offset
/// returns to REST.
#[derive(Debug, Clone)]
pub struct Monophonic {
    range: PitchRange,
    current: Option<i32>,
}

impl Monophonic {
    /// Start resting
    pub fn new(range: PitchRange) -> Self {
        Self {
            range,
            current: None,
        }
    }
}

impl SweepPolicy for Monophonic {
    type Frame = Token;

    fn onset(&mut self, pitch: i32) {
        self.current = Some(pitch);
    }

    fn offset(&mut self, pitch: i32) {
        // Offsets of a note that was already replaced are stale
        if self.current == Some(pitch) {
            self.current = None;
        }
    }

    fn frame(&self) -> Token {
        // Out-of-range pitches are still held, they just record as REST
        self.range.token_or_rest(self.current)
    }
}

/// Polyphonic policy: a set of sounding pitches
#[derive(Debug, Clone)]
pub struct Polyphonic {
    range: PitchRange,
    active: BTreeSet<i32>,
}

impl Polyphonic {
    /// Start silent
    pub fn new(range: PitchRange) -> Self {
        Self {
            range,
            active: BTreeSet::new(),
        }
    }
}

impl SweepPolicy for Polyphonic {
    type Frame = ChordFrame;

    fn onset(&mut self, pitch: i32) {
        self.active.insert(pitch);
    }

    fn offset(&mut self, pitch: i32) {
        self.active.remove(&pitch);
    }

    fn frame(&self) -> ChordFrame {
        let bits = self
            .active
            .iter()
            .filter_map(|&p| self.range.bit_for(p).ok());
        ChordFrame::from_indices(self.range.size(), bits)
    }
}

/// Grid length for `events`: `ceil(max(end) / step)`, zero when empty
pub fn grid_length(events: &[Event], timing: &GridTiming) -> usize {
    if events.is_empty() {
        return 0;
    }
    let max_end = events.iter().map(|e| e.end).fold(f64::NEG_INFINITY, f64::max);
    timing.steps_to_cover(max_end)
}

/// Onsets of every event followed by offsets of every event, stably sorted
/// by time so ties keep that insertion order.
fn boundaries(events: &[Event]) -> Vec<Boundary> {
    let mut list: Vec<Boundary> = events
        .iter()
        .map(|e| Boundary {
            time: e.start,
            pitch: e.pitch,
            onset: true,
        })
        .chain(events.iter().map(|e| Boundary {
            time: e.end,
            pitch: e.pitch,
            onset: false,
        }))
        .collect();
    list.sort_by(|a, b| a.time.total_cmp(&b.time));
    list
}

/// Sweep `events` across the grid, recording one frame per step.
///
/// Single monotonic pass over the sorted boundaries, O(events + steps).
pub fn sweep<P: SweepPolicy>(events: &[Event], timing: &GridTiming, mut policy: P) -> Vec<P::Frame> {
    let steps = grid_length(events, timing);
    if steps == 0 {
        return Vec::new();
    }

    let pending = boundaries(events);
    let mut cursor = 0;
    let mut grid = Vec::with_capacity(steps);

    for s in 0..steps {
        let t = timing.step_start(s);
        while cursor < pending.len() && pending[cursor].time <= t {
            let boundary = pending[cursor];
            if boundary.onset {
                policy.onset(boundary.pitch);
            } else {
                policy.offset(boundary.pitch);
            }
            cursor += 1;
        }
        grid.push(policy.frame());
    }

    grid
}

/// Monophonic bass grid
pub fn quantize_bass(events: &[Event], range: &PitchRange, timing: &GridTiming) -> Vec<Token> {
    sweep(events, timing, Monophonic::new(*range))
}

/// Polyphonic chord grid
pub fn quantize_chords(events: &[Event], range: &PitchRange, timing: &GridTiming) -> Vec<ChordFrame> {
    sweep(events, timing, Polyphonic::new(*range))
}
