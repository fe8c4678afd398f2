// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Next-token prediction.
//!
//! A [`Predictor`] carries hidden state across calls, so one instance
//! belongs to one session: reset it before the first step and call it
//! strictly in order, once per step.

use anyhow::{ensure, Result};

use crate::codec::{ChordFrame, PitchRange, Token};

/// Stateful next-token model
pub trait Predictor {
    /// Clear hidden state; required before the first `predict` of a session
    fn reset_state(&mut self);

    /// Probability of each token at the next step, `vocab_size` entries
    fn predict(&mut self, previous: Token, chord: &ChordFrame) -> Result<Vec<f32>>;

    /// Number of tokens the model scores, REST included
    fn vocab_size(&self) -> usize;
}

/// Rule-based stand-in for a trained model.
///
/// Scores each bass token by how well its pitch class fits the chord and
/// how close it lies to the previous note. The hidden state is how long the
/// previous token has been held: the longer a note sustains, the weaker the
/// pull to keep it.
#[derive(Debug, Clone)]
pub struct HeuristicPredictor {
    bass: PitchRange,
    guitar: PitchRange,
    /// Token seen on the previous call
    last: Option<Token>,
    /// Consecutive calls `last` has repeated
    held: u32,
}

impl HeuristicPredictor {
    const BASE: f32 = 0.2;
    const CHORD_TONE: f32 = 3.0;
    const ROOT: f32 = 6.0;
    const SUSTAIN: f32 = 8.0;
    const REST_IN_SILENCE: f32 = 20.0;
    const REST_UNDER_CHORD: f32 = 0.5;

    /// Create a predictor for the given bass vocabulary and chord range
    pub fn new(bass: PitchRange, guitar: PitchRange) -> Self {
        Self {
            bass,
            guitar,
            last: None,
            held: 0,
        }
    }

    /// Steps the previous token has been held
    pub fn held(&self) -> u32 {
        self.held
    }

    fn chord_pitch_classes(&self, chord: &ChordFrame) -> ([bool; 12], Option<u8>) {
        let mut classes = [false; 12];
        let mut lowest = None;
        for pitch in chord.active().filter_map(|bit| self.guitar.pitch_for_bit(bit)) {
            classes[(pitch % 12) as usize] = true;
            lowest = lowest.or(Some(pitch % 12));
        }
        (classes, lowest)
    }
}

impl Predictor for HeuristicPredictor {
    fn reset_state(&mut self) {
        self.last = None;
        self.held = 0;
    }

    fn predict(&mut self, previous: Token, chord: &ChordFrame) -> Result<Vec<f32>> {
        let rest = self.bass.rest_token();
        ensure!(previous <= rest, "token {} outside vocabulary of {}", previous, self.vocab_size());
        ensure!(
            chord.width() == self.guitar.size(),
            "chord frame has {} bits, expected {}",
            chord.width(),
            self.guitar.size()
        );

        if self.last == Some(previous) {
            self.held += 1;
        } else {
            self.last = Some(previous);
            self.held = 0;
        }

        let (classes, root) = self.chord_pitch_classes(chord);
        let previous_pitch = self.bass.pitch_for(previous);
        let sustain = Self::SUSTAIN / (1.0 + self.held as f32);

        let mut weights = vec![0.0f32; self.vocab_size()];
        for token in 0..rest {
            let Some(pitch) = self.bass.pitch_for(token) else {
                continue;
            };
            let class = (pitch % 12) as usize;

            let mut weight = Self::BASE;
            if classes[class] {
                weight += Self::CHORD_TONE;
            }
            if root == Some(class as u8) {
                weight += Self::ROOT;
            }
            if let Some(prev) = previous_pitch {
                let leap = (pitch as f32 - prev as f32).abs();
                weight /= 1.0 + leap / 7.0;
                if token == previous {
                    weight += sustain;
                }
            }
            weights[token as usize] = weight;
        }

        weights[rest as usize] = if chord.is_empty() {
            Self::REST_IN_SILENCE
        } else if previous == rest {
            Self::REST_UNDER_CHORD + sustain * 0.25
        } else {
            Self::REST_UNDER_CHORD
        };

        let total: f32 = weights.iter().sum();
        Ok(weights.into_iter().map(|w| w / total).collect())
    }

    fn vocab_size(&self) -> usize {
        self.bass.vocab_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::sampler::argmax;

    fn predictor() -> HeuristicPredictor {
        HeuristicPredictor::new(PitchRange::BASS, PitchRange::GUITAR)
    }

    /// Chord frame from guitar pitches
    fn chord(pitches: &[u8]) -> ChordFrame {
        let range = PitchRange::GUITAR;
        ChordFrame::from_indices(
            range.size(),
            pitches.iter().filter_map(|&p| range.bit_for(p as i32).ok()),
        )
    }

    #[test]
    fn test_distribution_is_normalized() {
        let mut p = predictor();
        p.reset_state();
        let dist = p.predict(40, &chord(&[48, 52, 55])).unwrap();
        assert_eq!(dist.len(), 41);
        assert!((dist.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(dist.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_silence_favours_rest() {
        let mut p = predictor();
        p.reset_state();
        let dist = p.predict(40, &PitchRange::GUITAR.empty_frame()).unwrap();
        assert_eq!(argmax(&dist), 40);
    }

    #[test]
    fn test_chord_root_favoured_from_rest() {
        let mut p = predictor();
        p.reset_state();
        // C major, lowest C; bass C notes are 24, 36, 48, 60
        let dist = p.predict(40, &chord(&[48, 52, 55])).unwrap();
        let best = PitchRange::BASS.pitch_for(argmax(&dist) as Token).unwrap();
        assert_eq!(best % 12, 0);
    }

    #[test]
    fn test_hidden_state_tracks_held_token() {
        let mut p = predictor();
        p.reset_state();
        let c = chord(&[48, 52, 55]);
        p.predict(13, &c).unwrap();
        p.predict(13, &c).unwrap();
        p.predict(13, &c).unwrap();
        assert_eq!(p.held(), 2);

        p.predict(17, &c).unwrap();
        assert_eq!(p.held(), 0);

        p.predict(17, &c).unwrap();
        p.reset_state();
        assert_eq!(p.held(), 0);
    }

    #[test]
    fn test_sustain_pull_weakens() {
        let mut p = predictor();
        p.reset_state();
        let c = chord(&[48, 52, 55]);
        // Token 13 is pitch 36 (C)
        let first = p.predict(13, &c).unwrap()[13];
        let later = (0..4).map(|_| p.predict(13, &c).unwrap()[13]).last().unwrap();
        assert!(later < first);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut p = predictor();
        p.reset_state();
        assert!(p.predict(41, &chord(&[48])).is_err());
        assert!(p.predict(0, &ChordFrame::empty(12)).is_err());
    }
}
