// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output for live performance.
//!
//! This module provides:
//! - The [`NoteSink`] trait the performance loop writes notes to
//! - FluidSynth integration for software synthesis
//! - Audio output via cpal

pub mod fluidsynth;
pub mod output;

pub use fluidsynth::FluidSynth;
pub use output::{AudioConfig, AudioOutput};

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use thiserror::Error;
use tracing::info;

/// Destination for generated notes.
///
/// Dropping a sink releases its device; implementations silence any
/// sounding notes first.
pub trait NoteSink {
    /// Start a note
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<()>;
    /// Stop a note
    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<()>;
}

/// Audio error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Soundfont path does not exist
    #[error("Soundfont file not found: {0}")]
    SoundfontNotFound(String),
    /// Failed to load soundfont
    #[error("Soundfont load failed: {0}")]
    SoundfontLoadFailed(String),
    /// Preset could not be bound to a channel
    #[error("No preset {bank}:{program} for channel {channel}")]
    ProgramSelectFailed { channel: u8, bank: u32, program: u32 },
    /// Failed to start audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// Failed to acquire lock
    #[error("Failed to acquire audio lock")]
    LockFailed,
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
}

/// Synthesizer voice: FluidSynth rendered through a cpal stream
pub struct SynthSink {
    /// FluidSynth instance, shared with the audio callback
    synth: Arc<Mutex<FluidSynth>>,
    /// Audio output, `None` until started
    output: Option<AudioOutput>,
    /// Output configuration
    config: AudioConfig,
}

impl SynthSink {
    /// Create a synth with no output yet
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        let synth = FluidSynth::with_sample_rate(config.sample_rate as f64)?;
        Ok(Self {
            synth: Arc::new(Mutex::new(synth)),
            output: None,
            config,
        })
    }

    /// Load an instrument bank and return its soundfont ID
    pub fn load_instrument_bank<P: AsRef<Path>>(&mut self, path: P) -> Result<u32, AudioError> {
        let mut synth = self.synth.lock().map_err(|_| AudioError::LockFailed)?;
        synth.load_soundfont(path)
    }

    /// Bind `bank:program` of a loaded soundfont to `channel`
    pub fn select_program(&mut self, channel: u8, soundfont: u32, bank: u32, program: u32) -> Result<(), AudioError> {
        let mut synth = self.synth.lock().map_err(|_| AudioError::LockFailed)?;
        synth.select_program(channel, soundfont, bank, program)
    }

    /// Start audio output at `gain`
    pub fn start(&mut self, gain: f32) -> Result<(), AudioError> {
        if self.output.is_some() {
            return Ok(());
        }

        self.synth.lock().map_err(|_| AudioError::LockFailed)?.set_gain(gain);

        let synth = Arc::clone(&self.synth);
        let output = AudioOutput::new(self.config.clone(), move |buffer, channels| {
            if let Ok(mut synth) = synth.lock() {
                synth.render(buffer, channels);
            }
        })?;

        self.output = Some(output);
        Ok(())
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.output.is_some()
    }

    /// Silence everything and close the audio stream
    pub fn shutdown(&mut self) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.all_notes_off();
        }
        if self.output.take().is_some() {
            info!("audio output stopped");
        }
    }
}

impl NoteSink for SynthSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<()> {
        let mut synth = self.synth.lock().map_err(|_| AudioError::LockFailed)?;
        synth.note_on(channel, pitch, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<()> {
        let mut synth = self.synth.lock().map_err(|_| AudioError::LockFailed)?;
        synth.note_off(channel, pitch);
        Ok(())
    }
}

impl Drop for SynthSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synth_sink_creation() {
        let sink = SynthSink::new(AudioConfig::default()).unwrap();
        assert!(!sink.is_running());
    }

    #[test]
    fn test_missing_instrument_bank() {
        let mut sink = SynthSink::new(AudioConfig::default()).unwrap();
        let result = sink.load_instrument_bank("/nonexistent/bass.sf2");
        assert!(matches!(result, Err(AudioError::SoundfontNotFound(_))));
    }

    #[test]
    fn test_notes_without_output() {
        let mut sink = SynthSink::new(AudioConfig::default()).unwrap();
        sink.note_on(0, 40, 64).unwrap();
        sink.note_off(0, 40).unwrap();
        sink.shutdown();
    }

    #[test]
    fn test_error_messages() {
        let err = AudioError::ProgramSelectFailed { channel: 0, bank: 0, program: 33 };
        assert_eq!(err.to_string(), "No preset 0:33 for channel 0");
    }
}
