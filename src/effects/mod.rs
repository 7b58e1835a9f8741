pub mod firework;

pub use firework::{palette_for, particle_count, Firework, FireworkConfig, FireworkEngine, Particle, Rgb};
