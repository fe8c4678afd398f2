// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Offline rendering.
//!
//! Generates one bass token per chord-grid step as fast as the predictor
//! allows, then merges runs of identical chords and tokens into sustained
//! notes and writes guitar and bass tracks to a MIDI file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info};

use super::predictor::Predictor;
use super::sampler::sample;
use crate::codec::{ChordFrame, PitchRange, Token};
use crate::config::{Config, TrackOutput};
use crate::dataset::parse_song;
use crate::midi::{ExportNote, ExportTrack, MidiExporter};
use crate::timing::GridTiming;

/// Outcome of `render_file`
#[derive(Debug, Clone, PartialEq)]
pub enum RenderReport {
    /// Input had no chord steps; no file was written
    NothingToDo,
    /// File written
    Written {
        path: PathBuf,
        steps: usize,
        chord_notes: usize,
        bass_notes: usize,
    },
}

/// Generate one token per chord frame, feeding each back as the next input.
///
/// The predictor is reset first and sees REST before the first step.
pub fn generate<P, R>(
    chords: &[ChordFrame],
    predictor: &mut P,
    rng: &mut R,
    temperature: f64,
    rest: Token,
) -> Result<Vec<Token>>
where
    P: Predictor + ?Sized,
    R: Rng + ?Sized,
{
    predictor.reset_state();

    let mut tokens = Vec::with_capacity(chords.len());
    let mut previous = rest;
    for (step, chord) in chords.iter().enumerate() {
        let distribution = predictor
            .predict(previous, chord)
            .with_context(|| format!("Predictor failed at step {}", step))?;
        let token = sample(&distribution, temperature, rng)
            .with_context(|| format!("Sampling failed at step {}", step))?;
        tokens.push(token);
        previous = token;
    }
    Ok(tokens)
}

/// Merge the chord grid into sustained notes.
///
/// Whenever the set of sounding pitches changes, every pitch of the old set
/// ends and every pitch of the new set starts, so a pitch held across a
/// chord change is split at the change.
pub fn chords_to_notes(chords: &[ChordFrame], range: &PitchRange, timing: &GridTiming, velocity: u8) -> Vec<ExportNote> {
    let mut notes = Vec::new();
    let mut close = |frame: &ChordFrame, start: f64, end: f64| {
        for pitch in frame.active().filter_map(|bit| range.pitch_for_bit(bit)) {
            notes.push(ExportNote::new(pitch, velocity, start, end));
        }
    };

    let mut current: Option<(ChordFrame, f64)> = None;
    for (step, frame) in chords.iter().enumerate() {
        match current {
            Some((active, _)) if active == *frame => {}
            _ => {
                let now = timing.step_start(step);
                if let Some((active, start)) = current {
                    close(&active, start, now);
                }
                current = Some((*frame, now));
            }
        }
    }
    if let Some((active, start)) = current {
        close(&active, start, timing.step_start(chords.len()));
    }

    notes
}

/// Merge runs of identical non-REST tokens into sustained notes
pub fn tokens_to_notes(tokens: &[Token], range: &PitchRange, timing: &GridTiming, velocity: u8) -> Vec<ExportNote> {
    let mut notes = Vec::new();
    let mut step = 0;
    while step < tokens.len() {
        let token = tokens[step];
        let run = tokens[step..].iter().take_while(|&&t| t == token).count();
        if let Some(pitch) = range.pitch_for(token) {
            notes.push(ExportNote::new(
                pitch,
                velocity,
                timing.step_start(step),
                timing.step_start(step + run),
            ));
        }
        step += run;
    }
    notes
}

fn track(output: &TrackOutput, notes: Vec<ExportNote>) -> ExportTrack {
    ExportTrack::new(output.name.clone(), output.channel)
        .with_program(output.program)
        .with_notes(notes)
}

/// Read chords from `input`, generate a bass line and write both to `output`.
///
/// A missing or unreadable input is an error. An input with no chord steps
/// writes nothing.
pub fn render_file<P, R>(
    input: &Path,
    output: &Path,
    config: &Config,
    predictor: &mut P,
    rng: &mut R,
) -> Result<RenderReport>
where
    P: Predictor + ?Sized,
    R: Rng + ?Sized,
{
    let song = parse_song(input, config, 0).with_context(|| format!("Failed to read chords from {:?}", input))?;

    if song.is_empty() {
        info!(input = %input.display(), "no chord data; nothing to do");
        return Ok(RenderReport::NothingToDo);
    }

    let tokens = generate(
        &song.chords,
        predictor,
        rng,
        config.generation.temperature,
        config.bass.rest_token(),
    )?;
    debug!(steps = tokens.len(), "generated bass tokens");

    let render = &config.render;
    let chord_notes = chords_to_notes(&song.chords, &config.guitar, &config.timing, render.guitar.velocity);
    let bass_notes = tokens_to_notes(&tokens, &config.bass, &config.timing, render.bass.velocity);
    let report = RenderReport::Written {
        path: output.to_path_buf(),
        steps: tokens.len(),
        chord_notes: chord_notes.len(),
        bass_notes: bass_notes.len(),
    };

    let mut exporter = MidiExporter::new(config.timing);
    exporter.set_ppqn(render.ppqn);
    exporter.add_track(track(&render.guitar, chord_notes));
    exporter.add_track(track(&render.bass, bass_notes));
    exporter
        .export(output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!(output = %output.display(), steps = tokens.len(), "rendered bass line");
    Ok(report)
}
