// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! FluidSynth integration for the live bass voice.
//!
//! Wraps FluidLite for SF2 playback: loading instrument banks, binding a
//! preset to a channel, and note events.

use std::path::Path;

use fluidlite::{IsSettings, Settings, Synth};
use tracing::{debug, info};

use super::AudioError;

/// Largest gain FluidSynth accepts
const MAX_GAIN: f32 = 10.0;

/// FluidSynth wrapper for software synthesis
pub struct FluidSynth {
    /// FluidLite synth instance
    synth: Synth,
    /// Output gain applied while rendering
    gain: f32,
}

impl FluidSynth {
    /// Create a synth rendering at `sample_rate` Hz
    pub fn with_sample_rate(sample_rate: f64) -> Result<Self, AudioError> {
        let settings = Settings::new()
            .map_err(|_| AudioError::InitFailed("Failed to create FluidLite settings".to_string()))?;

        if let Some(setting) = settings.num("synth.sample-rate") {
            setting.set(sample_rate);
        }
        if let Some(setting) = settings.int("synth.polyphony") {
            setting.set(64);
        }
        if let Some(setting) = settings.int("synth.midi-channels") {
            setting.set(16);
        }

        let synth = Synth::new(settings)
            .map_err(|_| AudioError::InitFailed("Failed to create FluidLite synth".to_string()))?;

        // A single monophonic voice needs no effects
        synth.set_reverb_on(false);
        synth.set_chorus_on(false);

        Ok(Self { synth, gain: 1.0 })
    }

    /// Load an SF2 file and return its soundfont ID
    pub fn load_soundfont<P: AsRef<Path>>(&mut self, path: P) -> Result<u32, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::SoundfontNotFound(path.display().to_string()));
        }

        let id = self
            .synth
            .sfload(path, true)
            .map_err(|_| AudioError::SoundfontLoadFailed(path.display().to_string()))?;

        info!(path = %path.display(), id, "loaded soundfont");
        Ok(id)
    }

    /// Bind a preset from a loaded soundfont to a channel
    pub fn select_program(&mut self, channel: u8, soundfont: u32, bank: u32, program: u32) -> Result<(), AudioError> {
        self.synth
            .program_select(channel as u32, soundfont, bank, program)
            .map_err(|_| AudioError::ProgramSelectFailed { channel, bank, program })?;
        debug!(channel, soundfont, bank, program, "program selected");
        Ok(())
    }

    /// Render audio to buffer (interleaved)
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 2 {
            let _ = self.synth.write(&mut *buffer);
            for sample in buffer.iter_mut() {
                *sample *= self.gain;
            }
        } else if channels == 1 {
            // Mono: render stereo then mix down
            let frames = buffer.len();
            let mut stereo = vec![0.0f32; frames * 2];
            let _ = self.synth.write(stereo.as_mut_slice());
            for (i, sample) in buffer.iter_mut().enumerate() {
                *sample = (stereo[i * 2] + stereo[i * 2 + 1]) * 0.5 * self.gain;
            }
        }
    }

    /// Send note on
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.synth.note_on(channel as u32, note as u32, velocity as u32);
    }

    /// Send note off
    pub fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.synth.note_off(channel as u32, note as u32);
    }

    /// All notes off on all channels
    pub fn all_notes_off(&mut self) {
        for channel in 0..16 {
            // CC 123 = All Notes Off
            let _ = self.synth.cc(channel, 123, 0);
            // CC 120 = All Sound Off
            let _ = self.synth.cc(channel, 120, 0);
        }
    }

    /// Set output gain (0.0 - 10.0)
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, MAX_GAIN);
    }
}
