// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Autoregressive bass generation.
//!
//! This module provides:
//! - Temperature sampling over next-token distributions
//! - The [`Predictor`] seam and a rule-based stand-in model
//! - The live performance loop, paced by wall-clock ticks
//! - The offline renderer, one step per chord-grid index

pub mod live;
pub mod predictor;
pub mod render;
pub mod sampler;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use live::{resolve_port, LiveSession, PlaybackState, SessionError, SessionReport, SessionState};
pub use predictor::{HeuristicPredictor, Predictor};
pub use render::{chords_to_notes, generate, render_file, tokens_to_notes, RenderReport};
pub use sampler::{sample, SamplerError};

/// Seeded RNG when a seed is given, entropy otherwise
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use anyhow::{bail, Result};

    use super::Predictor;
    use crate::codec::{ChordFrame, Token};

    /// Predictor that returns a one-hot distribution per call from a script
    /// and records what it was asked.
    pub struct ScriptedPredictor {
        pub vocab: usize,
        pub script: VecDeque<Token>,
        pub calls: Vec<(Token, ChordFrame)>,
        pub resets: usize,
        /// Fail on this call index (0-based)
        pub fail_at: Option<usize>,
    }

    impl ScriptedPredictor {
        pub fn new(vocab: usize, script: impl IntoIterator<Item = Token>) -> Self {
            Self {
                vocab,
                script: script.into_iter().collect(),
                calls: Vec::new(),
                resets: 0,
                fail_at: None,
            }
        }
    }

    impl Predictor for ScriptedPredictor {
        fn reset_state(&mut self) {
            self.resets += 1;
            self.calls.clear();
        }

        fn predict(&mut self, previous: Token, chord: &ChordFrame) -> Result<Vec<f32>> {
            if self.fail_at == Some(self.calls.len()) {
                bail!("model failure");
            }
            self.calls.push((previous, *chord));
            let next = self.script.pop_front().unwrap_or((self.vocab - 1) as Token);
            let mut dist = vec![0.0; self.vocab];
            dist[next as usize] = 1.0;
            Ok(dist)
        }

        fn vocab_size(&self) -> usize {
            self.vocab
        }
    }
}
