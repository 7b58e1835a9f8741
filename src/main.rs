use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sonic_fireworks::audio::MicInput;
use sonic_fireworks::music::{RodioTonePlayer, SilentPlayer, TonePlayer};
use sonic_fireworks::{EngineConfig, VisualizerEngine};

#[derive(Parser)]
#[command(name = "sonic-fireworks")]
#[command(about = "Listen to the microphone and answer every clap, snap and whistle with fireworks and music")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial input sensitivity (0.5 - 10)
    #[arg(short, long)]
    sensitivity: Option<f32>,

    /// Calibrate sensitivity to the room during the first five seconds
    #[arg(long)]
    auto_calibrate: bool,

    /// Do not generate music
    #[arg(long)]
    no_music: bool,

    /// Seed for reproducible launches and phrases
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds (runs until interrupted otherwise)
    #[arg(short, long)]
    duration: Option<f32>,

    /// Frames per second
    #[arg(long)]
    fps: Option<f32>,

    /// Tone output volume (0 - 1)
    #[arg(long, default_value = "0.5")]
    volume: f32,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(sensitivity) = args.sensitivity {
        config.level.initial_sensitivity = sensitivity;
    }
    if args.auto_calibrate {
        config.level.auto_calibrate = true;
    }
    if args.no_music {
        config.music.enabled = false;
    }
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    config.seed = args.seed.or(config.seed);

    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    info!("Starting Sonic Fireworks");

    let player: Box<dyn TonePlayer> = match RodioTonePlayer::new() {
        Ok(mut player) => {
            player.set_master_volume(args.volume);
            Box::new(player)
        }
        Err(e) => {
            warn!("⚠️  No tone output ({:#}); continuing silently", e);
            Box::new(SilentPlayer)
        }
    };

    let mut mic = MicInput::new()?;
    info!("Microphone ready at {} Hz", mic.sample_rate());

    let frame_period = Duration::from_secs_f32(1.0 / config.frame_rate.max(1.0));
    let deadline = args.duration.map(|secs| Duration::from_secs_f32(secs.max(0.0)));
    let mut engine = VisualizerEngine::new(config, player);

    let started = Instant::now();
    loop {
        let frame_start = Instant::now();

        let (level, spectrum) = mic.poll();
        let outcome = engine.tick(level, Some(&spectrum));
        if let (Some(event), Some(origin)) = (&outcome.event, outcome.launch) {
            info!(
                "Launch at ({:.0}, {:.0}) for {} {:.0}Hz",
                origin.x, origin.y, event.sound_type, event.dominant_pitch
            );
        }

        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_period {
            std::thread::sleep(frame_period - elapsed);
        }
    }

    let telemetry = engine.telemetry();
    info!(
        "Session over after {:.1}s: {} sound events, {} fireworks launched, final tempo {:.1} bpm ({})",
        started.elapsed().as_secs_f32(),
        engine.events_detected(),
        engine.fireworks().launched(),
        telemetry.tempo,
        telemetry.mode
    );

    Ok(())
}
