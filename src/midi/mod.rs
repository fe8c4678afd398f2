// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI I/O layer.
//!
//! Live input goes through the [`InputSource`] trait so the performance
//! loop can run against a hardware port (midir) or a scripted source in
//! tests. Standard MIDI files are read with midly and written by
//! [`export::MidiExporter`].

pub mod export;
pub mod file;
pub mod input;

use anyhow::Result;

pub use export::{ExportNote, ExportTrack, MidiExporter};
pub use file::{read_instruments, InstrumentNotes};
pub use input::{list_input_ports, print_input_ports, MidiMessage, MidirInput};

/// Trait for live MIDI input implementations.
///
/// Sources buffer whatever arrives between polls; the caller drains the
/// buffer in one batch at the start of each tick. Dropping the source
/// releases the underlying port.
pub trait InputSource {
    /// Return every message received since the last poll, in arrival order.
    ///
    /// Never blocks.
    fn poll_pending(&mut self) -> Result<Vec<MidiMessage>>;
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const PROGRAM_CHANGE: u8 = 0xC0;

    /// Channel 10 (0-based 9) carries General MIDI percussion
    pub const DRUM_CHANNEL: u8 = 9;
}
