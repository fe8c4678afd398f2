// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for solobass.
//!
//! One immutable [`Config`] is built at startup (defaults or a YAML file)
//! and passed by reference to every component: pitch ranges, grid timing,
//! windowing, augmentation, and the live and render settings.

use std::fs;
use std::ops::{Range, RangeInclusive};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::chord::MAX_CHORD_WIDTH;
use crate::codec::PitchRange;
use crate::timing::GridTiming;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Bass token range
    #[serde(default = "default_bass")]
    pub bass: PitchRange,
    /// Guitar chord range
    #[serde(default = "default_guitar")]
    pub guitar: PitchRange,
    /// Grid tempo and subdivision
    #[serde(default)]
    pub timing: GridTiming,
    /// Training data settings
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Sampling settings
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Live performance settings
    #[serde(default)]
    pub live: LiveConfig,
    /// Offline render settings
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_bass() -> PitchRange {
    PitchRange::BASS
}
fn default_guitar() -> PitchRange {
    PitchRange::GUITAR
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bass: default_bass(),
            guitar: default_guitar(),
            timing: GridTiming::default(),
            dataset: DatasetConfig::default(),
            generation: GenerationConfig::default(),
            live: LiveConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config = Self::from_yaml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Check the invariants every component relies on
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [("bass", &self.bass), ("guitar", &self.guitar)] {
            if range.lowest > range.highest {
                bail!("{} range is inverted: {}..={}", name, range.lowest, range.highest);
            }
            if range.highest > 127 {
                bail!("{} range exceeds MIDI pitch 127", name);
            }
        }
        if self.guitar.size() > MAX_CHORD_WIDTH {
            bail!("guitar range wider than {} pitches", MAX_CHORD_WIDTH);
        }
        if !(self.timing.bpm > 0.0) {
            bail!("tempo must be positive, got {}", self.timing.bpm);
        }
        if self.timing.steps_per_quarter == 0 {
            bail!("steps_per_quarter must be at least 1");
        }
        if self.dataset.window_length < 2 {
            bail!("window_length must be at least 2");
        }
        if self.dataset.transpose.is_empty() {
            bail!(
                "transpose range {}..{} is empty",
                self.dataset.transpose.start,
                self.dataset.transpose.end
            );
        }
        if self.dataset.bass_programs.start() <= self.dataset.guitar_programs.end()
            && self.dataset.guitar_programs.start() <= self.dataset.bass_programs.end()
        {
            bail!("bass and guitar program sets overlap");
        }
        if self.live.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        if !(self.generation.temperature > 0.0) {
            bail!("temperature must be positive, got {}", self.generation.temperature);
        }
        if self.render.ppqn == 0 {
            bail!("ppqn must be positive");
        }
        Ok(())
    }
}

/// Training data settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    /// Raw window length in steps (model sees `window_length - 1`)
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    /// Semitone offsets applied for augmentation (end exclusive)
    #[serde(default = "default_transpose")]
    pub transpose: Range<i32>,
    /// GM programs treated as bass (checked first)
    #[serde(default = "default_bass_programs")]
    pub bass_programs: RangeInclusive<u8>,
    /// GM programs treated as guitar
    #[serde(default = "default_guitar_programs")]
    pub guitar_programs: RangeInclusive<u8>,
}

fn default_window_length() -> usize {
    32
}
fn default_transpose() -> Range<i32> {
    -6..7
}
fn default_bass_programs() -> RangeInclusive<u8> {
    // 0-based 32..=39 plus the same family in 1-based files
    32..=40
}
fn default_guitar_programs() -> RangeInclusive<u8> {
    24..=31
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            window_length: default_window_length(),
            transpose: default_transpose(),
            bass_programs: default_bass_programs(),
            guitar_programs: default_guitar_programs(),
        }
    }
}

/// Sampling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Sampling temperature (> 0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Seed for reproducible sampling
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_temperature() -> f64 {
    1.0
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            seed: None,
        }
    }
}

/// Live performance settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveConfig {
    /// Wall-clock interval between generated steps
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Synth channel for the bass voice (0-15)
    #[serde(default)]
    pub channel: u8,
    /// Note-on velocity
    #[serde(default = "default_live_velocity")]
    pub velocity: u8,
    /// Soundfont bank
    #[serde(default)]
    pub bank: u32,
    /// Soundfont preset
    #[serde(default)]
    pub program: u32,
    /// Synth master gain
    #[serde(default = "default_gain")]
    pub gain: f32,
    /// Soundfont path
    #[serde(default = "default_soundfont")]
    pub soundfont: String,
}

fn default_tick_interval_ms() -> u64 {
    150
}
fn default_live_velocity() -> u8 {
    64
}
fn default_gain() -> f32 {
    1.5
}
fn default_soundfont() -> String {
    "./soundfonts/bass.sf2".to_string()
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            channel: 0,
            velocity: default_live_velocity(),
            bank: 0,
            program: 0,
            gain: default_gain(),
            soundfont: default_soundfont(),
        }
    }
}

impl LiveConfig {
    /// Tick interval as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Output track settings for one instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackOutput {
    /// Track name written to the file
    pub name: String,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// GM program
    pub program: u8,
    /// Note velocity
    pub velocity: u8,
}

/// Offline render settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Ticks per quarter note in written files
    #[serde(default = "default_ppqn")]
    pub ppqn: u16,
    /// Guitar chord track
    #[serde(default = "default_guitar_track")]
    pub guitar: TrackOutput,
    /// Generated bass track
    #[serde(default = "default_bass_track")]
    pub bass: TrackOutput,
}

fn default_ppqn() -> u16 {
    480
}
fn default_guitar_track() -> TrackOutput {
    TrackOutput {
        name: "Guitar Chords".to_string(),
        channel: 0,
        program: 26, // Jazz Guitar
        velocity: 90,
    }
}
fn default_bass_track() -> TrackOutput {
    TrackOutput {
        name: "Generated Bass".to_string(),
        channel: 1,
        program: 33, // Electric Bass (finger)
        velocity: 100,
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ppqn: default_ppqn(),
            guitar: default_guitar_track(),
            bass: default_bass_track(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.bass.rest_token(), 40);
        assert_eq!(config.guitar.size(), 45);
        assert_eq!(config.dataset.window_length, 32);
        assert_eq!(config.dataset.transpose, -6..7);
        assert_eq!(config.live.tick_interval(), Duration::from_millis(150));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
bass:
  lowest: 28
  highest: 55
timing:
  bpm: 90
live:
  tick_interval_ms: 100
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.bass, PitchRange::new(28, 55));
        assert_eq!(config.timing.bpm, 90.0);
        assert_eq!(config.timing.steps_per_quarter, 4);
        assert_eq!(config.live.tick_interval_ms, 100);
        assert_eq!(config.live.velocity, 64);
        assert_eq!(config.guitar, PitchRange::GUITAR);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_ranges() {
        let yaml = r#"
dataset:
  window_length: 16
  transpose:
    start: -2
    end: 3
  bass_programs:
    start: 32
    end: 39
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.dataset.window_length, 16);
        assert_eq!(config.dataset.transpose, -2..3);
        assert_eq!(config.dataset.bass_programs, 32..=39);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut original = Config::default();
        original.generation.seed = Some(7);
        original.render.bass.program = 34;

        let yaml = original.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.bass = PitchRange::new(60, 40);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dataset.window_length = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dataset.guitar_programs = 24..=32;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.temperature = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.steps_per_quarter = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/solobass.yaml").is_err());
    }
}
