// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Training data preparation.
//!
//! This module provides:
//! - Extraction of bass and guitar roles from a MIDI file by GM program
//! - Song parsing into aligned bass-token and chord-frame grids
//! - Slicing into fixed-length training windows (one-step-ahead targets)
//! - Transposition augmentation over a whole folder of songs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{ChordFrame, Token};
use crate::config::Config;
use crate::midi::file::{read_instruments, InstrumentNotes, MidiFileError};
use crate::quantize::{quantize_bass, quantize_chords, transpose, Event};

/// Dataset errors
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Bass and chord grids differ in length
    #[error("misaligned grids: {bass} bass steps vs {chords} chord steps")]
    MisalignedGrids { bass: usize, chords: usize },
    /// Window cannot hold an input step plus a target step
    #[error("window length {0} is shorter than 2")]
    WindowTooShort(usize),
}

/// Bass and guitar notes of one song
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleTracks {
    /// Every note from bass-program instruments
    pub bass: Vec<Event>,
    /// Every note from guitar-program instruments
    pub guitar: Vec<Event>,
}

/// Split instruments into bass and guitar roles; bass programs win when a
/// program appears in both sets, anything else is dropped.
pub fn extract_roles(instruments: &[InstrumentNotes], config: &Config) -> RoleTracks {
    let mut roles = RoleTracks::default();
    for instrument in instruments {
        if config.dataset.bass_programs.contains(&instrument.program) {
            roles.bass.extend_from_slice(&instrument.notes);
        } else if config.dataset.guitar_programs.contains(&instrument.program) {
            roles.guitar.extend_from_slice(&instrument.notes);
        }
    }
    roles
}

/// Quantized grids of one song, equal length
#[derive(Debug, Clone, PartialEq)]
pub struct SongGrids {
    /// Bass tokens
    pub bass: Vec<Token>,
    /// Chord frames
    pub chords: Vec<ChordFrame>,
}

impl SongGrids {
    /// Number of steps
    pub fn len(&self) -> usize {
        self.bass.len()
    }

    /// Whether the song has no steps
    pub fn is_empty(&self) -> bool {
        self.bass.is_empty()
    }
}

/// Right-pad the shorter grid (REST tokens / empty frames) to the longer length
pub fn align_grids(mut bass: Vec<Token>, mut chords: Vec<ChordFrame>, config: &Config) -> SongGrids {
    let len = bass.len().max(chords.len());
    bass.resize(len, config.bass.rest_token());
    chords.resize(len, config.guitar.empty_frame());
    SongGrids { bass, chords }
}

/// Transpose and quantize both roles, then align
pub fn quantize_song(roles: &RoleTracks, config: &Config, semitones: i32) -> SongGrids {
    let (bass_events, guitar_events) = if semitones == 0 {
        (roles.bass.clone(), roles.guitar.clone())
    } else {
        (transpose(&roles.bass, semitones), transpose(&roles.guitar, semitones))
    };

    let bass = quantize_bass(&bass_events, &config.bass, &config.timing);
    let chords = quantize_chords(&guitar_events, &config.guitar, &config.timing);
    align_grids(bass, chords, config)
}

/// Read a MIDI file and produce its aligned grids at a transposition
pub fn parse_song<P: AsRef<Path>>(path: P, config: &Config, semitones: i32) -> Result<SongGrids, MidiFileError> {
    let instruments = read_instruments(path)?;
    let roles = extract_roles(&instruments, config);
    Ok(quantize_song(&roles, config, semitones))
}

/// One training example, an independent copy of a slice of a song
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingWindow {
    /// Input tokens, `window_length - 1` steps
    pub notes: Vec<Token>,
    /// Input chord frames aligned with `notes`
    pub chords: Vec<ChordFrame>,
    /// Targets: `notes` shifted one step ahead
    pub targets: Vec<Token>,
}

/// Slice aligned grids into non-overlapping windows starting at 0.
///
/// A trailing partial window is discarded; a song shorter than one window
/// yields nothing.
pub fn slice_into_windows(
    bass: &[Token],
    chords: &[ChordFrame],
    window: usize,
) -> Result<Vec<TrainingWindow>, DatasetError> {
    if bass.len() != chords.len() {
        return Err(DatasetError::MisalignedGrids {
            bass: bass.len(),
            chords: chords.len(),
        });
    }
    if window < 2 {
        return Err(DatasetError::WindowTooShort(window));
    }

    Ok(bass
        .chunks_exact(window)
        .zip(chords.chunks_exact(window))
        .map(|(notes, frames)| TrainingWindow {
            notes: notes[..window - 1].to_vec(),
            chords: frames[..window - 1].to_vec(),
            targets: notes[1..].to_vec(),
        })
        .collect())
}

/// Everything built from a folder of songs
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    /// All windows, every song and transposition
    pub windows: Vec<TrainingWindow>,
    /// MIDI files found
    pub files: usize,
    /// (file, transposition) pairs that produced at least one window
    pub songs_used: usize,
    /// (file, transposition) pairs that failed to load
    pub failures: usize,
}

impl TrainingSet {
    /// (windows, steps per window) of the token arrays
    pub fn note_shape(&self) -> (usize, usize) {
        (self.windows.len(), self.windows.first().map_or(0, |w| w.notes.len()))
    }

    /// (windows, steps per window, chord width) of the chord array
    pub fn chord_shape(&self) -> (usize, usize, usize) {
        let first = self.windows.first();
        (
            self.windows.len(),
            first.map_or(0, |w| w.chords.len()),
            first.and_then(|w| w.chords.first()).map_or(0, |f| f.width()),
        )
    }
}

/// List `*.mid` files in `folder` (case-insensitive), sorted
pub fn midi_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("Failed to read MIDI folder: {:?}", folder))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| e.eq_ignore_ascii_case("mid"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Build the augmented training set for every song in `folder`.
///
/// Each song is parsed once per transposition offset. A file or offset
/// that fails is logged and skipped; the batch carries on.
pub fn build_training_dataset(folder: &Path, config: &Config) -> Result<TrainingSet> {
    let files = midi_files(folder)?;
    info!(folder = %folder.display(), files = files.len(), "building training dataset");

    let mut set = TrainingSet {
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        // Read once, transpose per offset
        let roles = match read_instruments(path) {
            Ok(instruments) => extract_roles(&instruments, config),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file");
                set.failures += config.dataset.transpose.len();
                continue;
            }
        };

        for semitones in config.dataset.transpose.clone() {
            let song = quantize_song(&roles, config, semitones);
            if song.is_empty() {
                debug!(path = %path.display(), semitones, "no bass notes");
                continue;
            }

            match slice_into_windows(&song.bass, &song.chords, config.dataset.window_length) {
                Ok(windows) if windows.is_empty() => {
                    debug!(
                        path = %path.display(),
                        steps = song.len(),
                        "song shorter than one window"
                    );
                }
                Ok(windows) => {
                    set.songs_used += 1;
                    set.windows.extend(windows);
                }
                Err(err) => {
                    warn!(path = %path.display(), semitones, error = %err, "skipping transposition");
                    set.failures += 1;
                }
            }
        }
    }

    info!(
        windows = set.windows.len(),
        songs = set.songs_used,
        failures = set.failures,
        "training dataset built"
    );
    Ok(set)
}
