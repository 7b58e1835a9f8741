use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sonic_fireworks::audio::fft::rms_level;
use sonic_fireworks::audio::{SoundEventDescriptor, SpectrumAnalyzer, DEFAULT_BINS};
use sonic_fireworks::music::{Mode, Note, SilentPlayer, Voice};
use sonic_fireworks::{EngineConfig, VisualizerEngine};

#[derive(Parser)]
#[command(name = "event-replay")]
#[command(about = "Run a WAV recording through the detection pipeline and report events and notes")]
struct Args {
    /// WAV file to replay
    #[arg()]
    input_file: PathBuf,

    /// Output file for the JSON report
    #[arg(short, long, default_value = "replay_report.json")]
    output: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed (defaults to the config seed, then 0)
    #[arg(long)]
    seed: Option<u64>,

    /// Frames per second
    #[arg(long)]
    fps: Option<f32>,

    /// Leave generated notes out of the report
    #[arg(long)]
    silent: bool,
}

#[derive(Serialize)]
struct EventEntry {
    time_ms: u64,
    launch: [f32; 2],
    #[serde(flatten)]
    descriptor: SoundEventDescriptor,
}

#[derive(Serialize)]
struct NoteEntry {
    time_ms: u64,
    voice: Voice,
    #[serde(flatten)]
    note: Note,
}

#[derive(Serialize)]
struct Summary {
    events: usize,
    fireworks_launched: u64,
    notes: usize,
    by_sound_type: BTreeMap<String, usize>,
    by_pitch_range: BTreeMap<String, usize>,
    final_tempo: f32,
    final_mode: Mode,
}

#[derive(Serialize)]
struct ReplayReport {
    file: String,
    sample_rate: u32,
    frame_rate: f32,
    frames: u64,
    duration_seconds: f32,
    seed: u64,
    events: Vec<EventEntry>,
    notes: Vec<NoteEntry>,
    summary: Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    let seed = args.seed.or(config.seed).unwrap_or(0);
    config.seed = Some(seed);
    config.mic_enabled = true;

    info!("Event replay: {}", args.input_file.display());
    let (samples, sample_rate) = read_mono(&args.input_file)?;
    let duration_seconds = samples.len() as f32 / sample_rate as f32;
    info!("Loaded {:.2}s of audio at {} Hz", duration_seconds, sample_rate);

    let frame_rate = config.frame_rate.max(1.0);
    let samples_per_frame = ((sample_rate as f32 / frame_rate).round() as usize).max(1);
    let mut analyzer = SpectrumAnalyzer::new(sample_rate as f32, DEFAULT_BINS);
    let mut engine = VisualizerEngine::new(config, Box::new(SilentPlayer));

    let mut events = Vec::new();
    let mut notes = Vec::new();
    let mut frames = 0u64;

    for (index, chunk) in samples.chunks(samples_per_frame).enumerate() {
        // The analyzer reads the trailing window, which may reach back into the previous frame.
        let window_start = (index * samples_per_frame + chunk.len()).saturating_sub(analyzer.fft_size());
        let window = &samples[window_start..index * samples_per_frame + chunk.len()];
        let spectrum = analyzer.analyze(window);
        let level = rms_level(chunk).clamp(0.0, 1.0);

        let outcome = engine.tick(level, Some(&spectrum));
        frames += 1;

        if let Some(descriptor) = outcome.event {
            let launch = outcome.launch.unwrap_or_default();
            events.push(EventEntry {
                time_ms: outcome.now_ms,
                launch: [launch.x, launch.y],
                descriptor,
            });
        }
        if !args.silent {
            notes.extend(outcome.notes.into_iter().map(|scheduled| NoteEntry {
                time_ms: scheduled.fire_at_ms,
                voice: scheduled.voice,
                note: scheduled.note,
            }));
        }
    }

    let mut by_sound_type = BTreeMap::new();
    let mut by_pitch_range = BTreeMap::new();
    for entry in &events {
        *by_sound_type.entry(entry.descriptor.sound_type.to_string()).or_insert(0) += 1;
        *by_pitch_range.entry(entry.descriptor.pitch_range.to_string()).or_insert(0) += 1;
    }

    let telemetry = engine.telemetry();
    let summary = Summary {
        events: events.len(),
        fireworks_launched: engine.fireworks().launched(),
        notes: notes.len(),
        by_sound_type,
        by_pitch_range,
        final_tempo: telemetry.tempo,
        final_mode: telemetry.mode,
    };

    info!("\n=== REPLAY RESULTS ===");
    info!("Frames: {} ({} samples each)", frames, samples_per_frame);
    info!("Sound events: {}", summary.events);
    for (sound_type, count) in &summary.by_sound_type {
        info!("  {}: {}", sound_type, count);
    }
    info!("Notes: {}", summary.notes);
    info!("Final tempo: {:.1} bpm ({})", summary.final_tempo, summary.final_mode);

    let report = ReplayReport {
        file: args.input_file.display().to_string(),
        sample_rate,
        frame_rate,
        frames,
        duration_seconds,
        seed,
        events,
        notes,
        summary,
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize replay report")?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write report {}", args.output.display()))?;
    info!("✅ Report saved to {}", args.output.display());

    Ok(())
}

/// Decode a WAV file to mono f32 samples in [-1, 1].
fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to decode float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}
