// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Multi-hot chord frames.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of pitches a frame can hold (the whole MIDI range)
pub const MAX_CHORD_WIDTH: usize = 128;

/// Fixed-width bit vector marking every pitch sounding during one step.
///
/// Bit `i` set means pitch `lowest + i` of the owning range is active.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChordFrame {
    bits: u128,
    width: u8,
}

impl ChordFrame {
    /// All-zero frame of `width` bits (clamped to 128)
    pub fn empty(width: usize) -> Self {
        Self {
            bits: 0,
            width: width.min(MAX_CHORD_WIDTH) as u8,
        }
    }

    /// Frame with the given bit indices set; indices past the width are ignored
    pub fn from_indices(width: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut frame = Self::empty(width);
        for index in indices {
            frame.set(index);
        }
        frame
    }

    /// Number of bits
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Set bit `index`; returns false if it lies outside the frame
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.width() {
            return false;
        }
        self.bits |= 1u128 << index;
        true
    }

    /// Clear bit `index`
    pub fn clear(&mut self, index: usize) {
        if index < self.width() {
            self.bits &= !(1u128 << index);
        }
    }

    /// Whether bit `index` is set
    pub fn is_set(&self, index: usize) -> bool {
        index < self.width() && self.bits & (1u128 << index) != 0
    }

    /// Whether no bit is set
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Set bit indices in ascending order
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width()).filter(move |&i| self.is_set(i))
    }
}

impl fmt::Debug for ChordFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChordFrame")
            .field("width", &self.width())
            .field("active", &self.active().collect::<Vec<_>>())
            .finish()
    }
}
