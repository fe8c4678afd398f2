// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Token codec.
//!
//! Maps MIDI pitches to bounded integer tokens for the monophonic bass
//! voice, and to bit positions in a multi-hot chord frame for the guitar.
//! The bass vocabulary is `0..size` for pitches plus one REST token equal
//! to `size`. Pitches outside a range are rejected, never wrapped.

pub mod chord;

pub use chord::ChordFrame;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer token for a bass pitch or the REST sentinel
pub type Token = u8;

/// Codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Pitch lies outside the representable range
    #[error("pitch {pitch} outside range {lowest}..={highest}")]
    OutOfRange { pitch: i32, lowest: u8, highest: u8 },
}

/// Map `pitch` to a token in `0..rest`.
///
/// Fails when the pitch lies outside `lowest..=highest`; the caller drops
/// the note.
pub fn pitch_to_token(pitch: i32, lowest: u8, highest: u8, rest: Token) -> Result<Token, CodecError> {
    if pitch < lowest as i32 || pitch > highest as i32 {
        return Err(CodecError::OutOfRange {
            pitch,
            lowest,
            highest,
        });
    }
    let token = (pitch - lowest as i32) as Token;
    debug_assert!(token < rest);
    Ok(token)
}

/// Map a token back to its MIDI pitch; `None` for REST (or anything past it)
pub fn token_to_pitch(token: Token, lowest: u8, rest: Token) -> Option<u8> {
    if token >= rest {
        return None;
    }
    lowest.checked_add(token)
}

/// Bit index of `pitch` in a chord frame covering `lowest..=highest`
pub fn chord_bit(pitch: i32, lowest: u8, highest: u8) -> Result<usize, CodecError> {
    if pitch < lowest as i32 || pitch > highest as i32 {
        return Err(CodecError::OutOfRange {
            pitch,
            lowest,
            highest,
        });
    }
    Ok((pitch - lowest as i32) as usize)
}

/// Inclusive MIDI pitch range of one instrument role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    /// Lowest representable pitch
    pub lowest: u8,
    /// Highest representable pitch
    pub highest: u8,
}

impl PitchRange {
    /// Default bass range: F1 (23) to D4 (62)
    pub const BASS: PitchRange = PitchRange {
        lowest: 23,
        highest: 62,
    };

    /// Default guitar range: E2 (40) to C6 (84)
    pub const GUITAR: PitchRange = PitchRange {
        lowest: 40,
        highest: 84,
    };

    /// Create a range
    pub fn new(lowest: u8, highest: u8) -> Self {
        Self { lowest, highest }
    }

    /// Number of pitches in the range
    pub fn size(&self) -> usize {
        (self.highest as usize + 1).saturating_sub(self.lowest as usize)
    }

    /// REST token for a vocabulary over this range
    pub fn rest_token(&self) -> Token {
        self.size() as Token
    }

    /// Vocabulary size including REST
    pub fn vocab_size(&self) -> usize {
        self.size() + 1
    }

    /// Whether `pitch` is representable
    pub fn contains(&self, pitch: i32) -> bool {
        pitch >= self.lowest as i32 && pitch <= self.highest as i32
    }

    /// Token for `pitch`
    pub fn token_for(&self, pitch: i32) -> Result<Token, CodecError> {
        pitch_to_token(pitch, self.lowest, self.highest, self.rest_token())
    }

    /// Token for `pitch`, REST when it is out of range
    pub fn token_or_rest(&self, pitch: Option<i32>) -> Token {
        pitch
            .and_then(|p| self.token_for(p).ok())
            .unwrap_or_else(|| self.rest_token())
    }

    /// Pitch for `token`, `None` for REST
    pub fn pitch_for(&self, token: Token) -> Option<u8> {
        token_to_pitch(token, self.lowest, self.rest_token())
    }

    /// Chord bit index for `pitch`
    pub fn bit_for(&self, pitch: i32) -> Result<usize, CodecError> {
        chord_bit(pitch, self.lowest, self.highest)
    }

    /// Pitch for a chord bit index
    pub fn pitch_for_bit(&self, index: usize) -> Option<u8> {
        if index < self.size() {
            Some(self.lowest + index as u8)
        } else {
            None
        }
    }

    /// Empty chord frame sized for this range
    pub fn empty_frame(&self) -> ChordFrame {
        ChordFrame::empty(self.size())
    }
}
