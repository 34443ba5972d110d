//! Point particle effects with a sawtooth drift along one axis.

use rand::Rng;
use serde::Deserialize;

/// Axis a particle effect drifts along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Flat (x, y, z) positions. The length is fixed at creation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleBuffer {
    positions: Vec<f32>,
}

impl ParticleBuffer {
    pub fn from_positions(positions: Vec<f32>) -> Self {
        debug_assert_eq!(positions.len() % 3, 0);
        Self { positions }
    }

    /// `count` particles scattered around `origin`: `spread` wide on the two
    /// cross axes and anywhere within `ceiling` along the drift axis.
    pub fn spawn(
        rng: &mut impl Rng,
        count: usize,
        origin: [f32; 3],
        axis: Axis,
        spread: f32,
        ceiling: f32,
    ) -> Self {
        let mut positions = Vec::with_capacity(count * 3);
        for _ in 0..count {
            for (i, &o) in origin.iter().enumerate() {
                let v = if i == axis.index() {
                    o + rng.random::<f32>() * ceiling
                } else {
                    o + (rng.random::<f32>() - 0.5) * spread
                };
                positions.push(v);
            }
        }
        Self { positions }
    }

    pub fn count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.positions
    }

    /// Adds `step` on `axis` to every particle. A value above
    /// `origin + ceiling` is set back to exactly `origin`.
    pub fn advance(&mut self, axis: Axis, step: f32, origin: f32, ceiling: f32) {
        for v in self.positions.iter_mut().skip(axis.index()).step_by(3) {
            *v += step;
            if *v > origin + ceiling {
                *v = origin;
            }
        }
    }
}

/// Named tuning for the built in effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticlePreset {
    Steam,
    Smoke,
    Bubbles,
    Lasers,
    Stars,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleParams {
    pub count: usize,
    pub axis: Axis,
    pub step: f32,
    pub ceiling: f32,
    pub spread: f32,
    pub color: [f32; 4],
    pub size: f32,
}

impl ParticlePreset {
    pub fn params(self) -> ParticleParams {
        match self {
            ParticlePreset::Steam => ParticleParams {
                count: 200,
                axis: Axis::Y,
                step: 0.01,
                ceiling: 1.5,
                spread: 0.5,
                color: [1.0, 1.0, 1.0, 0.6],
                size: 0.05,
            },
            ParticlePreset::Smoke => ParticleParams {
                count: 150,
                axis: Axis::Y,
                step: 0.005,
                ceiling: 2.0,
                spread: 0.8,
                color: [0.45, 0.45, 0.45, 0.5],
                size: 0.08,
            },
            ParticlePreset::Bubbles => ParticleParams {
                count: 100,
                axis: Axis::Y,
                step: 0.02,
                ceiling: 1.0,
                spread: 0.4,
                color: [0.6, 0.85, 1.0, 0.7],
                size: 0.04,
            },
            ParticlePreset::Lasers => ParticleParams {
                count: 60,
                axis: Axis::Z,
                step: 0.15,
                ceiling: 6.0,
                spread: 0.3,
                color: [1.0, 0.03, 0.23, 1.0],
                size: 0.03,
            },
            ParticlePreset::Stars => ParticleParams {
                count: 500,
                axis: Axis::X,
                step: 0.002,
                ceiling: 10.0,
                spread: 20.0,
                color: [1.0, 1.0, 0.9, 1.0],
                size: 0.06,
            },
        }
    }
}

/// One particle system as stored in the scene registry.
#[derive(Clone, Debug)]
pub struct ParticleEffect {
    pub name: String,
    pub origin: [f32; 3],
    pub params: ParticleParams,
    pub buffer: ParticleBuffer,
    /// Set on every tick, cleared once the renderer has uploaded the buffer.
    pub dirty: bool,
}

impl ParticleEffect {
    pub fn new(name: &str, origin: [f32; 3], params: ParticleParams, rng: &mut impl Rng) -> Self {
        let buffer = ParticleBuffer::spawn(
            rng,
            params.count,
            origin,
            params.axis,
            params.spread,
            params.ceiling,
        );
        Self {
            name: name.to_string(),
            origin,
            params,
            buffer,
            dirty: true,
        }
    }

    pub fn tick(&mut self) {
        let p = &self.params;
        self.buffer
            .advance(p.axis, p.step, self.origin[p.axis.index()], p.ceiling);
        self.dirty = true;
    }
}
