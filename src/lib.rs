//! Sound-reactive fireworks: microphone level and pitch in, debounced sound
//! events out, each answered with a firework burst and a musical phrase.

pub mod audio;
pub mod clock;
pub mod config;
pub mod effects;
pub mod engine;
pub mod math;
pub mod music;

pub use config::EngineConfig;
pub use engine::{Telemetry, TickOutcome, VisualizerEngine};
