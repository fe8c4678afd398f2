// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! SoloBass - chord-conditioned bass line generation.
//!
//! Guitar chords and bass notes are quantized onto a fixed step grid and
//! encoded as tokens. A stateful next-token predictor then generates a bass
//! line one step at a time, either live against a MIDI keyboard or offline
//! against the chords of a MIDI file.

pub mod audio;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod generation;
pub mod midi;
pub mod quantize;
pub mod timing;

pub use codec::{ChordFrame, PitchRange, Token};
pub use config::Config;
