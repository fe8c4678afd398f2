// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the fixed-step grid shared by the quantizer,
//! the offline renderer and the MIDI file writer.

pub mod grid;

pub use grid::GridTiming;
