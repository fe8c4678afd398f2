// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live performance loop.
//!
//! Once per tick the session drains the chord input, asks the predictor for
//! the next bass token, samples it and updates the synth. A repeated token
//! sustains the sounding note; a new token releases the old pitch before
//! starting the new one.
//!
//! The session owns its input source and note sink. `run` consumes the
//! session, so both are dropped (and release their devices) whichever way
//! the loop ends.

use std::time::Duration;

use rand::rngs::StdRng;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::predictor::Predictor;
use super::sampler::{sample, SamplerError};
use crate::audio::NoteSink;
use crate::codec::{ChordFrame, PitchRange, Token};
use crate::config::Config;
use crate::midi::{InputSource, MidiMessage};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Live session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Nothing to listen to
    #[error("no MIDI input ports available")]
    NoInputPorts,
    /// Requested port does not exist
    #[error("MIDI input port '{0}' not found")]
    PortNotFound(String),
    /// Port exists but could not be opened
    #[error("failed to open MIDI input '{port}'")]
    Connect {
        port: String,
        #[source]
        source: BoxError,
    },
    /// Draining the input source failed
    #[error("MIDI input failed on tick {tick}")]
    Input {
        tick: u64,
        #[source]
        source: BoxError,
    },
    /// The model failed; no token was sampled for this tick
    #[error("predictor failed on tick {tick}")]
    Predictor {
        tick: u64,
        #[source]
        source: BoxError,
    },
    /// The model returned an unusable distribution
    #[error("sampling failed on tick {tick}")]
    Sampling {
        tick: u64,
        #[source]
        source: SamplerError,
    },
    /// The synth rejected a note
    #[error("note sink failed on tick {tick}")]
    Sink {
        tick: u64,
        #[source]
        source: BoxError,
    },
}

/// Pick a port by index or exact name
pub fn resolve_port(ports: &[String], choice: &str) -> Result<String, SessionError> {
    if ports.is_empty() {
        return Err(SessionError::NoInputPorts);
    }
    let choice = choice.trim();
    let found = match choice.parse::<usize>() {
        Ok(index) => ports.get(index),
        Err(_) => ports.iter().find(|name| name.as_str() == choice),
    };
    found
        .cloned()
        .ok_or_else(|| SessionError::PortNotFound(choice.to_string()))
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, predictor not yet reset
    Idle,
    /// Ticking
    Running,
    /// Cancelled or failed; terminal
    Stopped,
}

/// What the session is playing
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Token fed to the predictor on the next tick
    pub current_token: Token,
    /// Token sounding on the sink; `None` before the first tick
    pub held: Option<Token>,
    /// Guitar pitches currently down
    pub chord: ChordFrame,
}

/// Summary of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionReport {
    /// Ticks completed
    pub ticks: u64,
    /// Note-on commands sent
    pub notes_started: u64,
}

/// A live bass session over an input source and a note sink
pub struct LiveSession<I: InputSource, S: NoteSink> {
    input: I,
    sink: S,
    rng: StdRng,
    bass: PitchRange,
    guitar: PitchRange,
    channel: u8,
    velocity: u8,
    temperature: f64,
    tick_interval: Duration,
    state: SessionState,
    playback: PlaybackState,
    report: SessionReport,
}

impl<I: InputSource, S: NoteSink> LiveSession<I, S> {
    /// Create an idle session
    pub fn new(input: I, sink: S, config: &Config, rng: StdRng) -> Self {
        Self {
            input,
            sink,
            rng,
            bass: config.bass,
            guitar: config.guitar,
            channel: config.live.channel,
            velocity: config.live.velocity,
            temperature: config.generation.temperature,
            tick_interval: config.live.tick_interval(),
            state: SessionState::Idle,
            playback: PlaybackState {
                current_token: config.bass.rest_token(),
                held: None,
                chord: config.guitar.empty_frame(),
            },
            report: SessionReport::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current playback state
    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    /// Counters so far
    pub fn report(&self) -> SessionReport {
        self.report
    }

    /// Reset the predictor and enter `Running`
    pub fn start<P: Predictor + ?Sized>(&mut self, predictor: &mut P) {
        predictor.reset_state();
        self.state = SessionState::Running;
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            temperature = self.temperature,
            "live session started"
        );
    }

    /// Enter the terminal `Stopped` state
    pub fn stop(&mut self) {
        if self.state != SessionState::Stopped {
            self.state = SessionState::Stopped;
            info!(ticks = self.report.ticks, notes = self.report.notes_started, "live session stopped");
        }
    }

    /// Apply note events to the chord state, in arrival order
    pub fn apply_input(&mut self, messages: &[MidiMessage]) {
        for message in messages {
            match *message {
                MidiMessage::NoteOn { note, velocity, .. } if velocity > 0 => {
                    if let Ok(bit) = self.guitar.bit_for(note as i32) {
                        self.playback.chord.set(bit);
                    }
                }
                MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => {
                    if let Ok(bit) = self.guitar.bit_for(note as i32) {
                        self.playback.chord.clear(bit);
                    }
                }
                _ => {}
            }
        }
    }

    /// Run one tick: drain input, predict, sample, update the sink
    pub fn tick<P: Predictor + ?Sized>(&mut self, predictor: &mut P) -> Result<Token, SessionError> {
        let tick = self.report.ticks;

        let messages = self
            .input
            .poll_pending()
            .map_err(|e| SessionError::Input { tick, source: e.into() })?;
        self.apply_input(&messages);

        let distribution = predictor
            .predict(self.playback.current_token, &self.playback.chord)
            .map_err(|e| SessionError::Predictor { tick, source: e.into() })?;
        let token = sample(&distribution, self.temperature, &mut self.rng)
            .map_err(|source| SessionError::Sampling { tick, source })?;

        self.emit(token).map_err(|e| SessionError::Sink { tick, source: e.into() })?;

        self.playback.current_token = token;
        self.report.ticks += 1;
        debug!(tick, token, chord = ?self.playback.chord, "tick");
        Ok(token)
    }

    /// Sink commands for a newly sampled token; a repeat sustains
    fn emit(&mut self, token: Token) -> anyhow::Result<()> {
        if self.playback.held == Some(token) {
            return Ok(());
        }

        if let Some(pitch) = self.playback.held.and_then(|old| self.bass.pitch_for(old)) {
            self.sink.note_off(self.channel, pitch)?;
        }
        // Held is updated before note-on so a failure never leaves it stale
        self.playback.held = Some(token);
        if let Some(pitch) = self.bass.pitch_for(token) {
            self.sink.note_on(self.channel, pitch, self.velocity)?;
            self.report.notes_started += 1;
        }
        Ok(())
    }

    /// Tick until `cancel` turns true or its sender is dropped.
    ///
    /// Cancellation is checked before every tick, and a pending wait is
    /// interrupted by it. Any tick error stops the session and is returned.
    pub async fn run<P: Predictor + ?Sized>(
        mut self,
        predictor: &mut P,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SessionReport, SessionError> {
        self.start(predictor);

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if *cancel.borrow_and_update() {
            self.stop();
            return Ok(self.report);
        }

        loop {
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow_and_update() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick(predictor) {
                        error!(error = %err, "live session failed");
                        self.stop();
                        return Err(err);
                    }
                }
            }
        }

        self.stop();
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedPredictor;
    use crate::generation::make_rng;
    use anyhow::Result;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        On(u8, u8, u8),
        Off(u8, u8),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Rc<RefCell<Vec<SinkCall>>>,
        released: Rc<Cell<bool>>,
    }

    impl NoteSink for RecordingSink {
        fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<()> {
            self.calls.borrow_mut().push(SinkCall::On(channel, pitch, velocity));
            Ok(())
        }

        fn note_off(&mut self, channel: u8, pitch: u8) -> Result<()> {
            self.calls.borrow_mut().push(SinkCall::Off(channel, pitch));
            Ok(())
        }
    }

    impl Drop for RecordingSink {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[derive(Default)]
    struct ScriptedInput {
        batches: VecDeque<Vec<MidiMessage>>,
        released: Rc<Cell<bool>>,
    }

    impl InputSource for ScriptedInput {
        fn poll_pending(&mut self) -> Result<Vec<MidiMessage>> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    impl Drop for ScriptedInput {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    fn note_on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn { channel: 0, note, velocity: 100 }
    }

    fn note_off(note: u8) -> MidiMessage {
        MidiMessage::NoteOff { channel: 0, note, velocity: 0 }
    }

    fn session(input: ScriptedInput, sink: RecordingSink) -> LiveSession<ScriptedInput, RecordingSink> {
        LiveSession::new(input, sink, &Config::default(), make_rng(Some(0)))
    }

    #[test]
    fn test_resolve_port() {
        let ports = vec!["IAC Bus 1".to_string(), "Keystation 49".to_string()];
        assert_eq!(resolve_port(&ports, "1").unwrap(), "Keystation 49");
        assert_eq!(resolve_port(&ports, " IAC Bus 1\n").unwrap(), "IAC Bus 1");
        assert!(matches!(resolve_port(&ports, "2"), Err(SessionError::PortNotFound(_))));
        assert!(matches!(resolve_port(&ports, "Launchpad"), Err(SessionError::PortNotFound(_))));
        assert!(matches!(resolve_port(&[], "0"), Err(SessionError::NoInputPorts)));
    }

    #[test]
    fn test_sustained_token_starts_one_note() {
        let sink = RecordingSink::default();
        let calls = Rc::clone(&sink.calls);
        let mut live = session(ScriptedInput::default(), sink);
        let mut predictor = ScriptedPredictor::new(41, [5, 5]);

        live.start(&mut predictor);
        assert_eq!(live.tick(&mut predictor).unwrap(), 5);
        assert_eq!(live.tick(&mut predictor).unwrap(), 5);

        // Token 5 in the default bass range is pitch 28
        assert_eq!(*calls.borrow(), vec![SinkCall::On(0, 28, 64)]);
        assert_eq!(live.report().notes_started, 1);
    }

    #[test]
    fn test_token_change_releases_then_starts() {
        let sink = RecordingSink::default();
        let calls = Rc::clone(&sink.calls);
        let mut live = session(ScriptedInput::default(), sink);
        let mut predictor = ScriptedPredictor::new(41, [5, 7]);

        live.start(&mut predictor);
        live.tick(&mut predictor).unwrap();
        live.tick(&mut predictor).unwrap();

        assert_eq!(
            *calls.borrow(),
            vec![SinkCall::On(0, 28, 64), SinkCall::Off(0, 28), SinkCall::On(0, 30, 64)]
        );
    }

    #[test]
    fn test_rest_silences_without_note_on() {
        let sink = RecordingSink::default();
        let calls = Rc::clone(&sink.calls);
        let mut live = session(ScriptedInput::default(), sink);
        let mut predictor = ScriptedPredictor::new(41, [40, 5, 40, 40]);

        live.start(&mut predictor);
        for _ in 0..4 {
            live.tick(&mut predictor).unwrap();
        }

        assert_eq!(*calls.borrow(), vec![SinkCall::On(0, 28, 64), SinkCall::Off(0, 28)]);
        assert_eq!(live.playback().held, Some(40));
    }

    #[test]
    fn test_chord_built_from_drained_input() {
        let input = ScriptedInput {
            batches: VecDeque::from(vec![
                // 30 is below the guitar range and is ignored
                vec![note_on(40), note_on(44), note_on(30)],
                vec![note_off(44), note_on(47)],
                vec![MidiMessage::NoteOn { channel: 0, note: 40, velocity: 0 }],
            ]),
            released: Rc::default(),
        };
        let mut live = session(input, RecordingSink::default());
        let mut predictor = ScriptedPredictor::new(41, [40, 40, 40]);

        live.start(&mut predictor);
        for _ in 0..3 {
            live.tick(&mut predictor).unwrap();
        }

        let seen: Vec<Vec<usize>> = predictor
            .calls
            .iter()
            .map(|(_, chord)| chord.active().collect())
            .collect();
        assert_eq!(seen, vec![vec![0, 4], vec![0, 7], vec![7]]);
    }

    #[test]
    fn test_predictor_sees_previous_token() {
        let mut live = session(ScriptedInput::default(), RecordingSink::default());
        let mut predictor = ScriptedPredictor::new(41, [3, 9, 9]);

        live.start(&mut predictor);
        for _ in 0..3 {
            live.tick(&mut predictor).unwrap();
        }

        let previous: Vec<Token> = predictor.calls.iter().map(|(t, _)| *t).collect();
        assert_eq!(previous, vec![40, 3, 9]);
        assert_eq!(live.playback().current_token, 9);
    }

    #[test]
    fn test_start_resets_predictor() {
        let mut live = session(ScriptedInput::default(), RecordingSink::default());
        let mut predictor = ScriptedPredictor::new(41, []);
        assert_eq!(live.state(), SessionState::Idle);

        live.start(&mut predictor);
        assert_eq!(predictor.resets, 1);
        assert_eq!(live.state(), SessionState::Running);
    }

    /// Cancels through its sender after a set number of predictions
    struct CancellingPredictor {
        inner: ScriptedPredictor,
        cancel_after: usize,
        cancel: watch::Sender<bool>,
    }

    impl Predictor for CancellingPredictor {
        fn reset_state(&mut self) {
            self.inner.reset_state();
        }

        fn predict(&mut self, previous: Token, chord: &ChordFrame) -> Result<Vec<f32>> {
            let dist = self.inner.predict(previous, chord)?;
            if self.inner.calls.len() == self.cancel_after {
                let _ = self.cancel.send(true);
            }
            Ok(dist)
        }

        fn vocab_size(&self) -> usize {
            self.inner.vocab_size()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_tick_boundary_on_cancel() {
        let input = ScriptedInput::default();
        let input_released = Rc::clone(&input.released);
        let sink = RecordingSink::default();
        let sink_released = Rc::clone(&sink.released);

        let (tx, rx) = watch::channel(false);
        let mut predictor = CancellingPredictor {
            inner: ScriptedPredictor::new(41, [5, 5, 7, 7, 7]),
            cancel_after: 4,
            cancel: tx,
        };

        let started = tokio::time::Instant::now();
        let report = session(input, sink).run(&mut predictor, rx).await.unwrap();

        assert_eq!(report.ticks, 4);
        assert_eq!(report.notes_started, 2);
        assert_eq!(predictor.inner.resets, 1);
        // First tick fires immediately, three more at 150 ms spacing
        assert_eq!(started.elapsed(), Duration::from_millis(450));
        assert!(input_released.get());
        assert!(sink_released.get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_wait() {
        let input = ScriptedInput::default();
        let input_released = Rc::clone(&input.released);
        let sink = RecordingSink::default();
        let sink_released = Rc::clone(&sink.released);

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(true);
        });
        let mut predictor = ScriptedPredictor::new(41, [5, 5, 5]);

        let started = tokio::time::Instant::now();
        let report = session(input, sink).run(&mut predictor, rx).await.unwrap();

        // Ticks at 0 and 150 ms; the wait for 300 ms is cut short
        assert_eq!(report.ticks, 2);
        assert_eq!(predictor.calls.len(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert!(input_released.get());
        assert!(sink_released.get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_already_cancelled() {
        let (tx, rx) = watch::channel(true);
        let mut predictor = ScriptedPredictor::new(41, [5]);

        let report = session(ScriptedInput::default(), RecordingSink::default())
            .run(&mut predictor, rx)
            .await
            .unwrap();

        assert_eq!(report.ticks, 0);
        assert!(predictor.calls.is_empty());
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut predictor = ScriptedPredictor::new(41, [5]);

        let report = session(ScriptedInput::default(), RecordingSink::default())
            .run(&mut predictor, rx)
            .await
            .unwrap();
        assert_eq!(report.ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predictor_failure_ends_session_and_releases() {
        let input = ScriptedInput::default();
        let input_released = Rc::clone(&input.released);
        let sink = RecordingSink::default();
        let calls = Rc::clone(&sink.calls);
        let sink_released = Rc::clone(&sink.released);

        let (_tx, rx) = watch::channel(false);
        let mut predictor = ScriptedPredictor::new(41, [5, 7, 9]);
        predictor.fail_at = Some(2);

        let err = session(input, sink).run(&mut predictor, rx).await.unwrap_err();

        assert!(matches!(err, SessionError::Predictor { tick: 2, .. }));
        // No token was sampled for the failing tick
        assert_eq!(
            *calls.borrow(),
            vec![SinkCall::On(0, 28, 64), SinkCall::Off(0, 28), SinkCall::On(0, 30, 64)]
        );
        assert!(input_released.get());
        assert!(sink_released.get());
    }
}
