//! Small per-frame behaviours attached to scene members.

use instant::Duration;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::{BobberConfig, NeonConfig, rgb},
    data_structures::scene_registry::{MemberId, SceneRegistry},
};

/// Anything ticked once per frame after the built in update steps.
pub trait Animator {
    fn tick(&mut self, registry: &mut SceneRegistry, dt: Duration);
}

/// Floats a member up and down around its placed height while spinning it.
#[derive(Clone, Debug)]
pub struct Bobber {
    pub member: MemberId,
    base_y: f32,
    amplitude: f32,
    frequency: f32,
    spin: f32,
    elapsed: f32,
}

impl Bobber {
    pub fn new(member: MemberId, base_y: f32, cfg: &BobberConfig) -> Self {
        Self {
            member,
            base_y,
            amplitude: cfg.amplitude,
            frequency: cfg.frequency,
            spin: cfg.spin,
            elapsed: 0.0,
        }
    }
}

impl Animator for Bobber {
    fn tick(&mut self, registry: &mut SceneRegistry, dt: Duration) {
        self.elapsed += dt.as_secs_f32();
        let Some(transform) = registry.transform_mut(self.member) else {
            return;
        };
        transform.position.y = self.base_y + self.amplitude * (self.frequency * self.elapsed).sin();
        transform.add_yaw(self.spin);
    }
}

/// Gives a light a random palette colour at a fixed interval.
#[derive(Debug)]
pub struct NeonCycle {
    pub light: MemberId,
    interval: Duration,
    palette: Vec<[f32; 3]>,
    since: Duration,
    rng: StdRng,
}

impl NeonCycle {
    pub fn new(light: MemberId, cfg: &NeonConfig) -> Self {
        Self::with_rng(light, cfg, StdRng::from_rng(&mut rand::rng()))
    }

    pub fn with_rng(light: MemberId, cfg: &NeonConfig, rng: StdRng) -> Self {
        Self {
            light,
            interval: Duration::from_millis(cfg.interval_ms.max(1)),
            palette: cfg.palette.iter().copied().map(rgb).collect(),
            since: Duration::ZERO,
            rng,
        }
    }
}

impl Animator for NeonCycle {
    fn tick(&mut self, registry: &mut SceneRegistry, dt: Duration) {
        self.since += dt;
        if self.since < self.interval || self.palette.is_empty() {
            return;
        }
        self.since = Duration::ZERO;
        let color = self.palette[self.rng.random_range(0..self.palette.len())];
        if let Some(light) = registry.light_mut(self.light) {
            log::trace!("neon {} -> {:?}", light.name, color);
            light.color = color;
        }
    }
}
