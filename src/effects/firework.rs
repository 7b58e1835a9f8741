use crate::audio::{PitchRange, SoundEventDescriptor, SoundType};
use crate::math::map_range;
use glam::Vec2;
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::TAU;

/// Launch, flight and explosion tuning. Distances are in canvas pixels, times in frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworkConfig {
    pub approach_rate: f32,
    pub trail_length: usize,
    pub explode_distance: f32,
    pub max_flight_ticks: u32,
    pub max_age_ticks: u32,
    pub target_spread_x: f32,
    pub target_rise_min: f32,
    pub target_rise_max: f32,
    pub particles_min: f32,
    pub particles_max: f32,
    pub gravity: f32,
    pub snap_particle_multiplier: f32,
    pub whistle_particle_multiplier: f32,
}

impl Default for FireworkConfig {
    fn default() -> Self {
        Self {
            approach_rate: 0.1,
            trail_length: 10,
            explode_distance: 20.0,
            max_flight_ticks: 60,
            max_age_ticks: 180,
            target_spread_x: 50.0,
            target_rise_min: 50.0,
            target_rise_max: 150.0,
            particles_min: 30.0,
            particles_max: 60.0,
            gravity: 0.1,
            snap_particle_multiplier: 1.5,
            whistle_particle_multiplier: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

const LOW_PALETTE: [Rgb; 4] = [
    Rgb::new(139, 69, 19),
    Rgb::new(255, 0, 0),
    Rgb::new(255, 165, 0),
    Rgb::new(255, 255, 0),
];
const MID_LOW_PALETTE: [Rgb; 4] = [
    Rgb::new(255, 165, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(255, 255, 255),
    Rgb::new(144, 238, 144),
];
const MID_HIGH_PALETTE: [Rgb; 4] = [
    Rgb::new(144, 238, 144),
    Rgb::new(0, 255, 0),
    Rgb::new(173, 216, 230),
    Rgb::new(0, 0, 255),
];
const HIGH_PALETTE: [Rgb; 4] = [
    Rgb::new(0, 255, 255),
    Rgb::new(0, 0, 255),
    Rgb::new(128, 0, 128),
    Rgb::new(0, 0, 139),
];
const SNAP_PALETTE: [Rgb; 3] = [Rgb::new(255, 255, 255), Rgb::new(255, 250, 205), Rgb::new(255, 215, 0)];
const WHISTLE_PALETTE: [Rgb; 3] = [Rgb::new(224, 255, 255), Rgb::new(0, 255, 255), Rgb::new(135, 206, 250)];

/// Colors a burst is drawn from; snaps and whistles get their own look.
pub fn palette_for(descriptor: &SoundEventDescriptor) -> &'static [Rgb] {
    match descriptor.sound_type {
        SoundType::Snap => &SNAP_PALETTE,
        SoundType::Whistle => &WHISTLE_PALETTE,
        _ => match descriptor.pitch_range {
            PitchRange::Low => &LOW_PALETTE,
            PitchRange::MidLow => &MID_LOW_PALETTE,
            PitchRange::MidHigh => &MID_HIGH_PALETTE,
            PitchRange::High => &HIGH_PALETTE,
        },
    }
}

fn pitch_speed_multiplier(range: PitchRange) -> f32 {
    match range {
        PitchRange::Low => 0.7,
        PitchRange::MidLow => 0.9,
        PitchRange::MidHigh => 1.1,
        PitchRange::High => 1.3,
    }
}

#[derive(Debug, Clone)]
pub struct Firework {
    pub position: Vec2,
    pub target: Vec2,
    pub trail: VecDeque<Vec2>,
    pub age: u32,
    pub exploded: bool,
    pub descriptor: SoundEventDescriptor,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub life: u32,
    pub max_life: u32,
    pub alpha: f32,
    pub size: f32,
    pub color: Rgb,
    pub intensity: f32,
    pub pitch_range: PitchRange,
    pub sound_type: SoundType,
}

impl Particle {
    fn step(&mut self, gravity: f32) {
        self.position += self.velocity;
        self.velocity.y += gravity;
        self.life = self.life.saturating_sub(1);
        self.alpha = if self.max_life == 0 {
            0.0
        } else {
            map_range(self.life as f32, 0.0, self.max_life as f32, 0.0, 255.0).max(0.0)
        };
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }
}

/// Spawns, flies and explodes fireworks; garbage-collects by frame count.
pub struct FireworkEngine {
    config: FireworkConfig,
    fireworks: Vec<Firework>,
    particles: Vec<Particle>,
    rng: ChaCha8Rng,
    launched: u64,
}

impl FireworkEngine {
    pub fn new(config: FireworkConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            fireworks: Vec::new(),
            particles: Vec::new(),
            rng,
            launched: 0,
        }
    }

    /// Launch a firework from `origin` toward a random point above it.
    pub fn trigger(&mut self, origin: Vec2, descriptor: SoundEventDescriptor) {
        let dx = self
            .rng
            .gen_range(-self.config.target_spread_x..=self.config.target_spread_x);
        let rise = self
            .rng
            .gen_range(self.config.target_rise_min..=self.config.target_rise_max.max(self.config.target_rise_min));

        self.fireworks.push(Firework {
            position: origin,
            target: origin + Vec2::new(dx, -rise),
            trail: VecDeque::with_capacity(self.config.trail_length),
            age: 0,
            exploded: false,
            descriptor,
        });
        self.launched += 1;
    }

    /// Advance all fireworks and particles by one frame.
    pub fn update(&mut self) {
        let config = &self.config;
        let rng = &mut self.rng;
        let particles = &mut self.particles;

        for firework in self.fireworks.iter_mut() {
            firework.age += 1;
            if firework.exploded {
                continue;
            }

            firework.position = firework.position.lerp(firework.target, config.approach_rate);
            firework.trail.push_back(firework.position);
            while firework.trail.len() > config.trail_length {
                firework.trail.pop_front();
            }

            if firework.position.distance(firework.target) < config.explode_distance
                || firework.age > config.max_flight_ticks
            {
                firework.exploded = true;
                let spawned = explode(config, rng, firework, particles);
                debug!(
                    "Firework exploded after {} frames: {} particles ({}, {})",
                    firework.age, spawned, firework.descriptor.pitch_range, firework.descriptor.sound_type
                );
            }
        }

        let max_age = config.max_age_ticks;
        self.fireworks.retain(|fw| !(fw.exploded && fw.age > max_age));

        for particle in self.particles.iter_mut() {
            particle.step(config.gravity);
        }
        self.particles.retain(Particle::is_alive);
    }

    pub fn fireworks(&self) -> &[Firework] {
        &self.fireworks
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn launched(&self) -> u64 {
        self.launched
    }
}

/// Number of particles a burst of this descriptor produces.
pub fn particle_count(config: &FireworkConfig, descriptor: &SoundEventDescriptor) -> usize {
    let intensity = descriptor.intensity.clamp(0.0, 1.0);
    let base = map_range(intensity, 0.0, 1.0, config.particles_min, config.particles_max);
    let multiplier = match descriptor.sound_type {
        SoundType::Snap => config.snap_particle_multiplier,
        SoundType::Whistle => config.whistle_particle_multiplier,
        _ => 1.0,
    };
    (base * multiplier).round().max(0.0) as usize
}

fn explode(config: &FireworkConfig, rng: &mut ChaCha8Rng, firework: &Firework, particles: &mut Vec<Particle>) -> usize {
    let descriptor = &firework.descriptor;
    let intensity = descriptor.intensity.clamp(0.0, 1.0);
    let count = particle_count(config, descriptor);
    let palette = palette_for(descriptor);

    let energy = map_range(intensity, 0.0, 1.0, 0.8, 2.0);
    let speed_scale = energy * pitch_speed_multiplier(descriptor.pitch_range) * energy;
    let life_scale = map_range(intensity, 0.0, 1.0, 1.0, 1.4);

    particles.reserve(count);
    for _ in 0..count {
        let mut angle = rng.gen_range(0.0..TAU);
        let mut speed = rng.gen_range(1.5..4.0) * speed_scale;

        match descriptor.pitch_range {
            PitchRange::High => {
                speed *= 1.1;
                angle += rng.gen_range(-0.3..0.3);
            }
            PitchRange::Low => {
                speed *= 0.9;
                angle += rng.gen_range(-0.15..0.15);
            }
            _ => {}
        }

        let size = rng.gen_range(2.0..4.0) * energy * energy;
        let life = (rng.gen_range(40.0..70.0) * life_scale).round().max(1.0) as u32;
        let color = palette[rng.gen_range(0..palette.len())];

        particles.push(Particle {
            position: firework.position,
            velocity: Vec2::new(angle.cos(), angle.sin()) * speed,
            life,
            max_life: life,
            alpha: 255.0,
            size,
            color,
            intensity,
            pitch_range: descriptor.pitch_range,
            sound_type: descriptor.sound_type,
        });
    }

    count
}
