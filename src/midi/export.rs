// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file export.
//!
//! Writes Type 1 files: a tempo track followed by one track per
//! instrument. Note times are given in seconds and converted to ticks
//! through the grid's tempo.

use std::fs;
use std::path::Path;

use super::file::MidiFileError;
use super::messages;
use crate::timing::GridTiming;

/// A track for export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTrack {
    /// Track name
    pub name: String,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Notes in this track
    pub notes: Vec<ExportNote>,
    /// Program change at start (None = no change)
    pub program: Option<u8>,
}

impl ExportTrack {
    /// Create a new export track
    pub fn new(name: impl Into<String>, channel: u8) -> Self {
        Self {
            name: name.into(),
            channel,
            notes: Vec::new(),
            program: None,
        }
    }

    /// Add a note
    pub fn add_note(&mut self, note: ExportNote) {
        self.notes.push(note);
    }

    /// Set program
    pub fn with_program(mut self, program: u8) -> Self {
        self.program = Some(program);
        self
    }

    /// Set notes
    pub fn with_notes(mut self, notes: Vec<ExportNote>) -> Self {
        self.notes = notes;
        self
    }
}

/// A note for export, timed in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportNote {
    /// Note number (0-127)
    pub pitch: u8,
    /// Velocity (1-127)
    pub velocity: u8,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl ExportNote {
    /// Create a new export note
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Self {
            pitch,
            velocity,
            start,
            end,
        }
    }
}

/// MIDI event for export
#[derive(Debug, Clone)]
struct MidiExportEvent {
    /// Absolute tick
    tick: u64,
    /// Ordering among events on the same tick: meta, program, off, on
    rank: u8,
    /// Event data
    data: Vec<u8>,
}

impl MidiExportEvent {
    fn note_on(tick: u64, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            tick,
            rank: 3,
            data: vec![messages::NOTE_ON | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
        }
    }

    fn note_off(tick: u64, channel: u8, note: u8) -> Self {
        Self {
            tick,
            rank: 2,
            data: vec![messages::NOTE_OFF | (channel & 0x0F), note & 0x7F, 0],
        }
    }

    fn program_change(channel: u8, program: u8) -> Self {
        Self {
            tick: 0,
            rank: 1,
            data: vec![messages::PROGRAM_CHANGE | (channel & 0x0F), program & 0x7F],
        }
    }

    fn tempo(micros_per_quarter: u32) -> Self {
        Self {
            tick: 0,
            rank: 0,
            data: vec![
                0xFF, 0x51, 0x03,
                ((micros_per_quarter >> 16) & 0xFF) as u8,
                ((micros_per_quarter >> 8) & 0xFF) as u8,
                (micros_per_quarter & 0xFF) as u8,
            ],
        }
    }

    fn track_name(name: &str) -> Self {
        let bytes = &name.as_bytes()[..name.len().min(127)];
        let mut data = vec![0xFF, 0x03, bytes.len() as u8];
        data.extend_from_slice(bytes);
        Self {
            tick: 0,
            rank: 0,
            data,
        }
    }
}

/// MIDI file exporter
#[derive(Debug, Clone)]
pub struct MidiExporter {
    /// PPQN (ticks per quarter note)
    ppqn: u16,
    /// Tempo written to the file and used for every seconds-to-ticks conversion
    timing: GridTiming,
    /// Tracks to export
    tracks: Vec<ExportTrack>,
}

impl MidiExporter {
    /// Create a new exporter at the grid's tempo
    pub fn new(timing: GridTiming) -> Self {
        Self {
            ppqn: 480,
            timing,
            tracks: Vec::new(),
        }
    }

    /// Set PPQN
    pub fn set_ppqn(&mut self, ppqn: u16) {
        self.ppqn = ppqn.max(1);
    }

    /// Add a track
    pub fn add_track(&mut self, track: ExportTrack) {
        self.tracks.push(track);
    }

    /// Export to file
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<(), MidiFileError> {
        let path = path.as_ref();
        fs::write(path, self.export_to_bytes()).map_err(|source| MidiFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Export to bytes
    pub fn export_to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_header(&mut buffer, 1, self.tracks.len() as u16 + 1);

        self.write_track(
            &mut buffer,
            vec![
                MidiExportEvent::track_name("Tempo"),
                MidiExportEvent::tempo(self.timing.micros_per_quarter()),
            ],
        );

        for track in &self.tracks {
            let mut events = vec![MidiExportEvent::track_name(&track.name)];
            if let Some(program) = track.program {
                events.push(MidiExportEvent::program_change(track.channel, program));
            }
            for note in &track.notes {
                let start = self.timing.seconds_to_ticks(note.start, self.ppqn);
                // At least one tick long, or the off would sort before the on
                let end = self.timing.seconds_to_ticks(note.end, self.ppqn).max(start + 1);
                events.push(MidiExportEvent::note_on(start, track.channel, note.pitch, note.velocity));
                events.push(MidiExportEvent::note_off(end, track.channel, note.pitch));
            }
            self.write_track(&mut buffer, events);
        }

        buffer
    }

    /// Write MIDI file header chunk
    fn write_header(&self, buffer: &mut Vec<u8>, format: u16, num_tracks: u16) {
        buffer.extend_from_slice(b"MThd");
        // Chunk length (always 6)
        buffer.extend_from_slice(&6u32.to_be_bytes());
        buffer.extend_from_slice(&format.to_be_bytes());
        buffer.extend_from_slice(&num_tracks.to_be_bytes());
        buffer.extend_from_slice(&self.ppqn.to_be_bytes());
    }

    /// Write a track chunk; events are ordered by tick, then rank
    fn write_track(&self, buffer: &mut Vec<u8>, mut events: Vec<MidiExportEvent>) {
        events.sort_by_key(|e| (e.tick, e.rank));

        let mut track_data = Vec::new();
        let mut last_tick = 0u64;

        for event in &events {
            let delta = event.tick.saturating_sub(last_tick);
            write_variable_length(&mut track_data, delta as u32);
            track_data.extend_from_slice(&event.data);
            last_tick = event.tick;
        }

        // End of track
        write_variable_length(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        buffer.extend_from_slice(b"MTrk");
        buffer.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&track_data);
    }
}

/// Write a variable-length quantity
fn write_variable_length(buffer: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buffer.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::file::parse_instruments;

    #[test]
    fn test_header_and_track_count() {
        let mut exporter = MidiExporter::new(GridTiming::default());
        exporter.set_ppqn(24);
        exporter.add_track(ExportTrack::new("Guitar", 0));
        exporter.add_track(ExportTrack::new("Bass", 1));

        let bytes = exporter.export_to_bytes();
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[8..10], &1u16.to_be_bytes()); // Format 1
        assert_eq!(&bytes[10..12], &3u16.to_be_bytes()); // tempo + 2 tracks
        assert_eq!(&bytes[12..14], &24u16.to_be_bytes());
        assert_eq!(&bytes[14..18], b"MTrk");
    }

    #[test]
    fn test_tempo_track_follows_grid() {
        let exporter = MidiExporter::new(GridTiming::new(90.0, 4));
        let bytes = exporter.export_to_bytes();
        let at = bytes.windows(3).position(|w| w == [0xFF, 0x51, 0x03]).unwrap();
        // 60_000_000 / 90 = 666_667 = 0x0A2C2B
        assert_eq!(&bytes[at + 3..at + 6], &[0x0A, 0x2C, 0x2B]);
    }

    #[test]
    fn test_variable_length() {
        let mut buffer = Vec::new();
        write_variable_length(&mut buffer, 0);
        assert_eq!(buffer, vec![0x00]);

        buffer.clear();
        write_variable_length(&mut buffer, 127);
        assert_eq!(buffer, vec![0x7F]);

        buffer.clear();
        write_variable_length(&mut buffer, 128);
        assert_eq!(buffer, vec![0x81, 0x00]);

        buffer.clear();
        write_variable_length(&mut buffer, 16383);
        assert_eq!(buffer, vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_tempo_event() {
        let event = MidiExportEvent::tempo(500_000);
        assert_eq!(&event.data[..3], &[0xFF, 0x51, 0x03]);
        // 500000 = 0x07A120
        assert_eq!(&event.data[3..], &[0x07, 0xA1, 0x20]);
    }

    #[test]
    fn test_note_off_precedes_note_on_on_shared_tick() {
        let mut exporter = MidiExporter::new(GridTiming::default());
        let mut track = ExportTrack::new("Bass", 0);
        track.add_note(ExportNote::new(40, 100, 0.0, 0.5));
        track.add_note(ExportNote::new(40, 100, 0.5, 1.0));
        exporter.add_track(track);

        let bytes = exporter.export_to_bytes();
        // Find the note track (second MTrk) and collect its status bytes
        let second = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == b"MTrk")
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        let data = &bytes[second + 8..];
        let statuses: Vec<u8> = data
            .iter()
            .copied()
            .filter(|&b| b == 0x90 || b == 0x80)
            .collect();
        assert_eq!(statuses, vec![0x90, 0x80, 0x90, 0x80]);
    }

    #[test]
    fn test_sub_tick_note_keeps_one_tick() {
        // One tick per quarter is coarser than a 0.125 s step
        let mut exporter = MidiExporter::new(GridTiming::default());
        exporter.set_ppqn(1);
        let mut track = ExportTrack::new("Bass", 0).with_program(33);
        track.add_note(ExportNote::new(40, 100, 0.0, 0.125));
        track.add_note(ExportNote::new(43, 100, 2.0, 2.5));
        exporter.add_track(track);

        let instruments = parse_instruments(&exporter.export_to_bytes()).unwrap();
        let notes = &instruments[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 40);
        assert!((notes[0].start - 0.0).abs() < 1e-9);
        assert!((notes[0].end - 0.5).abs() < 1e-9);
    }
}
