// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::watch;
use tracing::info;

use solobass::audio::{AudioConfig, SynthSink};
use solobass::config::Config;
use solobass::dataset::build_training_dataset;
use solobass::generation::{
    make_rng, render_file, resolve_port, HeuristicPredictor, LiveSession, RenderReport, SessionError,
};
use solobass::midi::{list_input_ports, print_input_ports, MidirInput};

fn print_usage() {
    println!("SoloBass - Chord-conditioned bass line generator");
    println!();
    println!("Usage: solobass <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  --list-sources              List available MIDI sources (inputs)");
    println!("  --live [PORT]               Play a live bass line against chords from source PORT");
    println!("  --render <IN> <OUT>         Add a generated bass line to the chords of IN, write OUT");
    println!("  --dataset <FOLDER>          Build training windows from the MIDI files in FOLDER");
    println!("  --help                      Show this help message");
    println!();
    println!("Options:");
    println!("  --config <FILE>             Load settings from a YAML file");
    println!("  --temperature <T>           Sampling temperature (default 1.0)");
    println!("  --seed <N>                  Seed the sampler for repeatable output");
    println!("  --soundfont <PATH>          Soundfont for the live bass voice");
    println!();
    println!("Set RUST_LOG (e.g. RUST_LOG=solobass=debug) for log output.");
}

fn setup_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err: Box<dyn std::error::Error + Send + Sync>| anyhow!("failed to initialise tracing: {err}"))?;
    Ok(())
}

/// Arguments after the command: positionals plus option overrides
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    config: Option<String>,
    temperature: Option<f64>,
    seed: Option<u64>,
    soundfont: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} requires a value", name))
            };
            match arg.as_str() {
                "--config" => options.config = Some(value("--config")?),
                "--soundfont" => options.soundfont = Some(value("--soundfont")?),
                "--temperature" => {
                    let raw = value("--temperature")?;
                    options.temperature =
                        Some(raw.parse().map_err(|_| anyhow!("Invalid temperature: {}", raw))?);
                }
                "--seed" => {
                    let raw = value("--seed")?;
                    options.seed = Some(raw.parse().map_err(|_| anyhow!("Invalid seed: {}", raw))?);
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                _ => options.positional.push(arg.clone()),
            }
        }

        Ok(options)
    }

    /// Defaults or the YAML file, with command-line overrides applied
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(temperature) = self.temperature {
            config.generation.temperature = temperature;
        }
        if let Some(seed) = self.seed {
            config.generation.seed = Some(seed);
        }
        if let Some(soundfont) = &self.soundfont {
            config.live.soundfont = soundfont.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Ask on stdin until a valid port is chosen
fn prompt_for_port(ports: &[String]) -> Result<String> {
    println!("Available MIDI ports:");
    for (i, name) in ports.iter().enumerate() {
        println!("  {}: {}", i, name);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Select input port: ");
        io::stdout().flush()?;

        let line = lines
            .next()
            .ok_or_else(|| anyhow!("No port selected"))??;
        match resolve_port(ports, &line) {
            Ok(name) => return Ok(name),
            Err(_) => println!("Invalid selection, try again."),
        }
    }
}

fn run_live(port: Option<&str>, config: &Config) -> Result<()> {
    let ports = list_input_ports()?;
    if ports.is_empty() {
        println!("No MIDI input ports available. Exiting.");
        return Ok(());
    }

    let port_name = match port {
        Some(choice) => resolve_port(&ports, choice)?,
        None => prompt_for_port(&ports)?,
    };

    let input = MidirInput::open(&port_name).map_err(|e| SessionError::Connect {
        port: port_name.clone(),
        source: e.into(),
    })?;

    // Dropped (and silenced) on any early return below
    let mut sink = SynthSink::new(AudioConfig::default())?;
    let soundfont = sink
        .load_instrument_bank(&config.live.soundfont)
        .with_context(|| format!("Cannot start live session with soundfont {}", config.live.soundfont))?;
    sink.select_program(config.live.channel, soundfont, config.live.bank, config.live.program)?;
    sink.start(config.live.gain)?;

    let mut predictor = HeuristicPredictor::new(config.bass, config.guitar);
    let session = LiveSession::new(input, sink, config, make_rng(config.generation.seed));

    println!("Listening on '{}'. Press Ctrl+C to stop.", port_name);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let report = runtime.block_on(async {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = cancel_tx.send(true);
            }
        });
        session.run(&mut predictor, cancel_rx).await
    })?;

    println!();
    println!("Stopped after {} ticks ({} notes).", report.ticks, report.notes_started);
    Ok(())
}

fn run_render(input: &str, output: &str, config: &Config) -> Result<()> {
    let mut predictor = HeuristicPredictor::new(config.bass, config.guitar);
    let mut rng = make_rng(config.generation.seed);

    match render_file(Path::new(input), Path::new(output), config, &mut predictor, &mut rng)? {
        RenderReport::NothingToDo => println!("No chord data; nothing to do."),
        RenderReport::Written {
            path,
            steps,
            chord_notes,
            bass_notes,
        } => {
            println!("Wrote {}", path.display());
            println!("  {} steps, {} chord notes, {} bass notes", steps, chord_notes, bass_notes);
        }
    }
    Ok(())
}

fn run_dataset(folder: &str, config: &Config) -> Result<()> {
    let set = build_training_dataset(Path::new(folder), config)?;
    let (windows, steps) = set.note_shape();
    let (_, _, width) = set.chord_shape();

    println!("Files:   {} ({} songs used, {} failures)", set.files, set.songs_used, set.failures);
    println!("Notes:   {} x {}", windows, steps);
    println!("Chords:  {} x {} x {}", windows, steps, width);
    println!("Targets: {} x {}", windows, steps);
    Ok(())
}

fn main() -> Result<()> {
    setup_tracing()?;

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("SoloBass - Chord-conditioned bass line generator");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let options = Options::parse(&args[2..])?;

    match args[1].as_str() {
        "--list-sources" => {
            print_input_ports()?;
        }
        "--live" => {
            let config = options.load_config()?;
            info!(soundfont = %config.live.soundfont, "starting live mode");
            run_live(options.positional.first().map(String::as_str), &config)?;
        }
        "--render" => {
            if options.positional.len() < 2 {
                eprintln!("Error: --render requires an input and an output file");
                std::process::exit(1);
            }
            let config = options.load_config()?;
            run_render(&options.positional[0], &options.positional[1], &config)?;
        }
        "--dataset" => {
            let Some(folder) = options.positional.first() else {
                eprintln!("Error: --dataset requires a folder of MIDI files");
                std::process::exit(1);
            };
            let config = options.load_config()?;
            run_dataset(folder, &config)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
