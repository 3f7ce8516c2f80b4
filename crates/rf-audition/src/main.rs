//! ReelForge Insert Audition
//!
//! Usage:
//!   rf-audition manifest                      - Print the parameter manifest
//!   rf-audition list                          - List processor kinds
//!   rf-audition render --preset chain.json    - Run a chain preset against a test tone

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rf_core::{Sample, db_to_gain, gain_to_db};
use rf_insert::{
    ChainPreset, EngineConfig, InsertEngine, InsertRenderer, ParamManifest, ProcessorKind,
};

#[derive(Parser)]
#[command(name = "rf-audition", version, about = "ReelForge insert-chain audition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parameter manifest as JSON
    Manifest,
    /// List processor kinds with their parameter counts
    List,
    /// Render a test tone through a chain preset
    Render {
        /// Chain preset JSON
        #[arg(short, long)]
        preset: PathBuf,
        /// Engine config JSON (defaults otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        freq: f64,
        /// Tone peak level in dBFS
        #[arg(long, default_value_t = -6.0, allow_negative_numbers = true)]
        level_db: f64,
        /// Length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest => print_manifest(),
        Commands::List => {
            list_processors();
            Ok(())
        }
        Commands::Render {
            preset,
            config,
            freq,
            level_db,
            seconds,
        } => render(&preset, config.as_deref(), freq, level_db, seconds),
    }
}

fn print_manifest() -> Result<()> {
    let json = ParamManifest::current()
        .to_json()
        .context("serializing parameter manifest")?;
    println!("{json}");
    Ok(())
}

fn list_processors() {
    println!("{:<20} {:<32} {:>6}", "ID", "NAME", "PARAMS");
    for kind in ProcessorKind::ALL {
        println!(
            "{:<20} {:<32} {:>6}",
            kind.id(),
            kind.display_name(),
            kind.param_count()
        );
    }
}

/// Level accumulator for one signal
#[derive(Debug, Default, Clone, Copy)]
struct Levels {
    peak: f64,
    sum_sq: f64,
    samples: usize,
}

impl Levels {
    fn add(&mut self, block: &[Sample]) {
        for &s in block {
            self.peak = self.peak.max(s.abs());
            self.sum_sq += s * s;
        }
        self.samples += block.len();
    }

    fn peak_db(&self) -> f64 {
        gain_to_db(self.peak)
    }

    fn rms_db(&self) -> f64 {
        if self.samples == 0 {
            return gain_to_db(0.0);
        }
        gain_to_db((self.sum_sq / self.samples as f64).sqrt())
    }
}

struct RenderReport {
    input: Levels,
    output: Levels,
    blocks: u64,
    non_finite: bool,
}

const TRACK: u32 = 0;

fn render(
    preset_path: &Path,
    config_path: Option<&Path>,
    freq: f64,
    level_db: f64,
    seconds: f64,
) -> Result<()> {
    if !(seconds > 0.0 && seconds <= 600.0) {
        bail!("--seconds must be in (0, 600], got {seconds}");
    }

    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let json = std::fs::read_to_string(preset_path)
        .with_context(|| format!("reading preset {}", preset_path.display()))?;
    let preset = ChainPreset::from_json(&json)?;

    let sample_rate = config.sample_rate.as_f64();
    if !(freq > 0.0 && freq < sample_rate / 2.0) {
        bail!("--freq must be between 0 and Nyquist ({} Hz)", sample_rate / 2.0);
    }
    let block = config.max_block_size;
    let (mut engine, renderer) = InsertEngine::new(config)?;
    engine.create_track(TRACK)?;
    engine.import_chain(TRACK, &preset)?;
    for slot in engine.chain_snapshot(TRACK)? {
        if let Some(kind) = slot.processor {
            log::info!(
                "slot {}: {}{} (mix {:.2})",
                slot.slot,
                kind.display_name(),
                if slot.bypassed { " [bypassed]" } else { "" },
                slot.mix
            );
        }
    }

    let total = (seconds * sample_rate).round() as usize;
    let amplitude = db_to_gain(level_db);
    let audio = thread::Builder::new()
        .name("rf-audition-render".into())
        .spawn(move || render_tone(renderer, block, total, freq, amplitude, sample_rate))
        .context("spawning render thread")?;
    let report = audio
        .join()
        .map_err(|_| anyhow::anyhow!("render thread panicked"))?;
    let reclaimed = engine.collect_garbage();
    log::debug!("reclaimed {reclaimed} objects after render");

    let latency = engine.chain_latency(TRACK)?;
    println!("Rendered {total} samples in {} blocks of {block}", report.blocks);
    println!(
        "Input:   peak {:>7.2} dBFS   rms {:>7.2} dBFS",
        report.input.peak_db(),
        report.input.rms_db()
    );
    println!(
        "Output:  peak {:>7.2} dBFS   rms {:>7.2} dBFS",
        report.output.peak_db(),
        report.output.rms_db()
    );
    println!(
        "Latency: {latency} samples ({:.2} ms)",
        latency as f64 * 1000.0 / sample_rate
    );
    for slot in engine.chain_snapshot(TRACK)? {
        if slot.faults > 0 {
            log::warn!("slot {} skipped {} blocks on non-finite output", slot.slot, slot.faults);
        }
    }
    if report.non_finite {
        bail!("output contained non-finite samples");
    }
    Ok(())
}

/// Audio thread body: real block sizes, buffers allocated once up front
fn render_tone(
    mut renderer: InsertRenderer,
    block: usize,
    total: usize,
    freq: f64,
    amplitude: f64,
    sample_rate: f64,
) -> RenderReport {
    let mut left = vec![0.0; block];
    let mut right = vec![0.0; block];
    let mut report = RenderReport {
        input: Levels::default(),
        output: Levels::default(),
        blocks: 0,
        non_finite: false,
    };
    let phase_inc = 2.0 * PI * freq / sample_rate;

    let mut pos = 0;
    while pos < total {
        let len = block.min(total - pos);
        for (i, (l, r)) in left[..len].iter_mut().zip(&mut right[..len]).enumerate() {
            let x = amplitude * (phase_inc * (pos + i) as f64).sin();
            *l = x;
            *r = x;
        }
        report.input.add(&left[..len]);
        report.input.add(&right[..len]);
        renderer.process_track(TRACK, &mut left[..len], &mut right[..len]);
        report.output.add(&left[..len]);
        report.output.add(&right[..len]);
        report.non_finite |= !rf_core::all_finite(&left[..len]) || !rf_core::all_finite(&right[..len]);
        report.blocks += 1;
        pos += len;
    }
    report
}
