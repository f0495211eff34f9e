#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use citrine_core::headless::{HeadlessBackend, HeadlessImage, HeadlessOptions, HeadlessWindow};
use citrine_core::{ResultStatus, RoundKind, Settings, System};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Runs scheduling rounds of a headless emulation session")]
struct Args {
    /// Program image to load.
    program: PathBuf,

    /// Number of scheduling rounds to run.
    #[arg(long, default_value_t = 10)]
    rounds: u32,

    /// Settings file (JSON). Missing fields keep their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emulate the newer hardware revision (four application cores).
    #[arg(long)]
    new_3ds: bool,

    /// Write a fresh headless image with this program id to PROGRAM before loading it.
    ///
    /// Accepts decimal or `0x`-prefixed hex.
    #[arg(long, value_name = "PROGRAM_ID", value_parser = parse_program_id)]
    write_image: Option<u64>,

    /// Directory receiving save data and custom texture folders.
    #[arg(long)]
    user_dir: Option<PathBuf>,

    /// Print the session summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RoundReport {
    CatchUp { core: usize, delay: u64 },
    Synchronized { slice: u64 },
}

impl From<RoundKind> for RoundReport {
    fn from(round: RoundKind) -> Self {
        match round {
            RoundKind::CatchUp { core, delay } => RoundReport::CatchUp { core, delay },
            RoundKind::Synchronized { slice } => RoundReport::Synchronized { slice },
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    program_id: Option<String>,
    cores: usize,
    rounds: Vec<RoundReport>,
    global_ticks: u64,
    reschedules: usize,
    shutdown_requested: bool,
}

fn parse_program_id(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid program id {value:?}: {err}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if args.new_3ds {
        settings.is_new_3ds = true;
    }

    if let Some(program_id) = args.write_image {
        let image = HeadlessImage {
            n3ds_mode: u8::from(settings.is_new_3ds),
            ..HeadlessImage::new(program_id)
        };
        fs::write(&args.program, image.to_bytes())
            .with_context(|| format!("failed to write image {}", args.program.display()))?;
    }

    let backend = HeadlessBackend::new(HeadlessOptions {
        user_dir: args.user_dir.clone(),
        ..HeadlessOptions::default()
    });
    let state = backend.state();
    let mut system = System::new(Box::new(backend), settings);

    let status = system.load(Rc::new(HeadlessWindow::new()), &args.program);
    if !status.is_success() {
        bail!("failed to load {}: {status}", args.program.display());
    }
    tracing::info!(rounds = args.rounds, "session running");

    let mut rounds = Vec::new();
    let mut shutdown_requested = false;
    for _ in 0..args.rounds {
        match system.run_loop(true) {
            ResultStatus::Success => {}
            ResultStatus::ShutdownRequested => {
                shutdown_requested = true;
                break;
            }
            other => bail!("session stopped: {other}"),
        }
        if let Some(round) = system.last_round() {
            rounds.push(RoundReport::from(round));
        }
    }

    let summary = Summary {
        program_id: system.program_id().map(|id| format!("{id:016X}")),
        cores: system.cpu_cores().len(),
        rounds,
        global_ticks: system
            .timing()
            .map(|timing| timing.global_ticks())
            .unwrap_or_default(),
        reschedules: state.reschedules().len(),
        shutdown_requested,
    };
    system.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        if let Some(program_id) = &summary.program_id {
            println!("program {program_id} on {} cores", summary.cores);
        }
        for (index, round) in summary.rounds.iter().enumerate() {
            match round {
                RoundReport::CatchUp { core, delay } => {
                    println!("round {index}: catch-up core={core} delay={delay}")
                }
                RoundReport::Synchronized { slice } => {
                    println!("round {index}: synchronized slice={slice}")
                }
            }
        }
        println!("global ticks: {}", summary.global_ticks);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_ids_accept_hex_and_decimal() {
        assert_eq!(parse_program_id("0x0004000000068B00"), Ok(0x0004_0000_0006_8B00));
        assert_eq!(parse_program_id("256"), Ok(256));
        assert!(parse_program_id("0xZZ").is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "citrine",
            "game.ctr",
            "--rounds",
            "3",
            "--new-3ds",
            "--write-image",
            "0x10",
        ])
        .unwrap();
        assert_eq!(args.rounds, 3);
        assert!(args.new_3ds);
        assert_eq!(args.write_image, Some(0x10));
        assert!(!args.json);
    }
}
