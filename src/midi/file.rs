// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file reading.
//!
//! Flattens an SMF into per-instrument note lists in seconds. Tick times
//! are converted through the file's full tempo map, so tempo changes in
//! any track apply to every track.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tracing::debug;

use super::messages::DRUM_CHANNEL;
use crate::quantize::Event;

/// Default tempo when a file carries none: 120 BPM
const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// MIDI file errors
#[derive(Debug, Error)]
pub enum MidiFileError {
    /// Input file does not exist
    #[error("MIDI file not found: {0}")]
    NotFound(PathBuf),
    /// Reading or writing failed
    #[error("MIDI file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Malformed SMF data
    #[error("malformed MIDI file: {0}")]
    Parse(#[from] midly::Error),
}

/// Notes played by one instrument (track, channel and program)
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentNotes {
    /// Source track index
    pub track: usize,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// GM program in effect when the notes started
    pub program: u8,
    /// Notes in seconds
    pub notes: Vec<Event>,
}

/// Piecewise tick-to-seconds conversion
#[derive(Debug, Clone)]
struct TempoMap {
    /// (start tick, seconds at start tick, numerator, denominator) per
    /// segment; a tick lasts `numerator / denominator` seconds
    segments: Vec<(u64, f64, f64, f64)>,
}

impl TempoMap {
    fn build(smf: &Smf<'_>) -> Self {
        let mut changes: Vec<(u64, u32)> = Vec::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    changes.push((tick, tempo.as_int()));
                }
            }
        }
        changes.sort_by_key(|&(tick, _)| tick);

        match smf.header.timing {
            Timing::Metrical(ppq) => {
                let denominator = ppq.as_int().max(1) as f64 * 1_000_000.0;
                let mut map = Self {
                    segments: vec![(0, 0.0, DEFAULT_MICROS_PER_QUARTER as f64, denominator)],
                };
                for (tick, micros) in changes {
                    let at = map.seconds(tick);
                    if map.segments.last().map_or(false, |&(start, ..)| start == tick) {
                        map.segments.pop();
                    }
                    map.segments.push((tick, at, micros as f64, denominator));
                }
                map
            }
            Timing::Timecode(fps, subframes) => {
                // Absolute time: ticks are subframes, tempo events are irrelevant
                let per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                Self {
                    segments: vec![(0, 0.0, 1.0, per_second)],
                }
            }
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        let index = self.segments.partition_point(|&(start, ..)| start <= tick);
        match self.segments.get(index.saturating_sub(1)) {
            // One division keeps exact grid times exact
            Some(&(start, seconds, numerator, denominator)) => {
                seconds + (tick - start) as f64 * numerator / denominator
            }
            None => 0.0,
        }
    }
}

/// Read a MIDI file into per-instrument note lists.
///
/// Percussion (channel 10) is dropped.
pub fn read_instruments<P: AsRef<Path>>(path: P) -> Result<Vec<InstrumentNotes>, MidiFileError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MidiFileError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| MidiFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let instruments = parse_instruments(&bytes)?;
    debug!(path = %path.display(), instruments = instruments.len(), "read MIDI file");
    Ok(instruments)
}

/// Parse SMF bytes into per-instrument note lists
pub fn parse_instruments(bytes: &[u8]) -> Result<Vec<InstrumentNotes>, MidiFileError> {
    let smf = Smf::parse(bytes)?;
    let tempo = TempoMap::build(&smf);

    // BTreeMap keeps output order stable: by track, channel, program
    let mut grouped: BTreeMap<(usize, u8, u8), Vec<Event>> = BTreeMap::new();

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut programs = [0u8; 16];
        // Open notes per (channel, key), oldest first
        let mut open: BTreeMap<(u8, u8), VecDeque<(u64, u8)>> = BTreeMap::new();

        for event in track {
            tick += event.delta.as_int() as u64;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();

            match message {
                MidiMessage::ProgramChange { program } => {
                    programs[channel as usize] = program.as_int();
                }
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    open.entry((channel, key.as_int()))
                        .or_default()
                        .push_back((tick, programs[channel as usize]));
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let key = key.as_int();
                    if let Some((start, program)) =
                        open.get_mut(&(channel, key)).and_then(|q| q.pop_front())
                    {
                        grouped.entry((track_index, channel, program)).or_default().push(
                            Event::new(tempo.seconds(start), tempo.seconds(tick), key as i32),
                        );
                    }
                }
                _ => {}
            }
        }

        // Notes never released end with the track, flushed in start order
        let mut unreleased: Vec<(u64, u8, u8, u8)> = open
            .into_iter()
            .flat_map(|((channel, key), starts)| {
                starts.into_iter().map(move |(start, program)| (start, channel, key, program))
            })
            .collect();
        unreleased.sort_by_key(|&(start, channel, key, _)| (start, channel, key));
        for (start, channel, key, program) in unreleased {
            grouped.entry((track_index, channel, program)).or_default().push(Event::new(
                tempo.seconds(start),
                tempo.seconds(tick),
                key as i32,
            ));
        }
    }

    Ok(grouped
        .into_iter()
        .filter(|((_, channel, _), _)| *channel != DRUM_CHANNEL)
        .map(|((track, channel, program), notes)| InstrumentNotes {
            track,
            channel,
            program,
            notes,
        })
        .collect())
}
