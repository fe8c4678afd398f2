// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI Input handling for the live chord source.
//!
//! This module parses incoming bytes into [`MidiMessage`]s and provides a
//! midir-backed [`InputSource`] that buffers messages between polls.

use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use super::{messages, InputSource};

const CLIENT_NAME: &str = "solobass";

/// Parsed MIDI message types
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Anything the chord tracker does not care about
    Unknown(Vec<u8>),
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a MidiMessage
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        let msg_type = status & 0xF0;
        let channel = status & 0x0F;

        match (msg_type, rest) {
            (messages::NOTE_OFF, [note, velocity, ..]) => Some(MidiMessage::NoteOff {
                channel,
                note: note & 0x7F,
                velocity: velocity & 0x7F,
            }),
            (messages::NOTE_ON, [note, velocity, ..]) => {
                let velocity = velocity & 0x7F;
                // Note On with velocity 0 is equivalent to Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note: note & 0x7F,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: note & 0x7F,
                        velocity,
                    })
                }
            }
            _ => Some(MidiMessage::Unknown(data.to_vec())),
        }
    }
}

/// MIDI input port opened through midir.
///
/// The callback thread forwards parsed messages into a channel; polling
/// drains it without blocking. Dropping the handle closes the port.
pub struct MidirInput {
    name: String,
    connection: Option<MidiInputConnection<()>>,
    receiver: Receiver<MidiMessage>,
}

impl MidirInput {
    /// Open the input port with the given name
    pub fn open(port_name: &str) -> Result<Self> {
        let mut midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
        midi_in.ignore(Ignore::All);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map_or(false, |n| n == port_name))
            .ok_or_else(|| anyhow!("MIDI source '{}' not found", port_name))?;

        let (tx, rx): (Sender<MidiMessage>, Receiver<MidiMessage>) = mpsc::channel();

        let connection = midi_in
            .connect(
                &port,
                "solobass-input",
                move |_timestamp, data, _| {
                    if let Some(msg) = MidiMessage::parse(data) {
                        let _ = tx.send(msg);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to source '{}': {}", port_name, e))?;

        info!(port = port_name, "opened MIDI input");

        Ok(Self {
            name: port_name.to_string(),
            connection: Some(connection),
            receiver: rx,
        })
    }

    /// Close the port; later polls return nothing
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(port = %self.name, "closed MIDI input");
        }
    }
}

impl InputSource for MidirInput {
    fn poll_pending(&mut self) -> Result<Vec<MidiMessage>> {
        let pending: Vec<MidiMessage> = self.receiver.try_iter().collect();
        if !pending.is_empty() {
            debug!(count = pending.len(), "drained MIDI input");
        }
        Ok(pending)
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// List the names of all available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME)
        .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;

    Ok(midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i))
        })
        .collect())
}

/// Print all available MIDI input ports to stdout
pub fn print_input_ports() -> Result<()> {
    let ports = list_input_ports()?;
    if ports.is_empty() {
        println!("No MIDI input ports found.");
    } else {
        println!("Available MIDI ports:");
        for (i, name) in ports.iter().enumerate() {
            println!("  {}: {}", i, name);
        }
    }
    Ok(())
}
