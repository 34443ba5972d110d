//! Scene definition file.
//!
//! Everything that differs between scenes lives in one TOML document: the
//! placements to load, the primitives built in code, lights, and the roles
//! (targets, vehicles, door, particles, ...) that bind behaviour to named
//! placements once they load.

use std::path::Path;

use serde::Deserialize;

use crate::data_structures::{
    instance::Transform, mixer::MixerStep, particles::ParticlePreset,
};

#[derive(Debug, thiserror::Error)]
pub enum SceneDefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// `0xRRGGBB` to linear-ish float RGB in `0..=1`.
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// One model to load and where to put it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacementRecord {
    pub asset: String,
    pub position: [f32; 3],
    pub scale: [f32; 3],
    #[serde(default)]
    pub rotation_x: Option<f32>,
    #[serde(default)]
    pub rotation_y: Option<f32>,
    #[serde(default)]
    pub rotation_z: Option<f32>,
    /// Binds the loaded instance to roles declared elsewhere in the file.
    #[serde(default)]
    pub name: Option<String>,
}

impl PlacementRecord {
    pub fn new(asset: &str, position: [f32; 3], scale: [f32; 3]) -> Self {
        Self {
            asset: asset.to_string(),
            position,
            scale,
            rotation_x: None,
            rotation_y: None,
            rotation_z: None,
            name: None,
        }
    }

    /// Scale, then position, then each rotation axis whose value is set and
    /// non-zero. A zero angle leaves the default orientation.
    pub fn transform(&self) -> Transform {
        let mut transform = Transform::new();
        transform.scale = self.scale.into();
        transform.position = self.position.into();
        let angles = [self.rotation_x, self.rotation_y, self.rotation_z];
        for (axis, angle) in angles.into_iter().enumerate() {
            if let Some(angle) = angle.filter(|a| *a != 0.0) {
                transform.rotation[axis] = angle;
            }
        }
        transform
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 70.0,
            near: 0.1,
            far: 100.0,
            position: [0.0, 1.0, 5.0],
            target: [0.0, 0.0, 0.0],
            damping: 0.25,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    pub color: u32,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self { color: 0x87ceeb }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "s".into(),
            backward: "w".into(),
            left: "a".into(),
            right: "d".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Distance per frame along the local Z axis.
    pub step: f32,
    /// Yaw per frame in radians.
    pub turn: f32,
    pub bindings: KeyBindings,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            step: 0.2,
            turn: 0.04,
            bindings: KeyBindings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    /// Lies in the XY plane facing +Z.
    Plane { width: f32, height: f32 },
    Box { width: f32, height: f32, depth: f32 },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        #[serde(default = "default_segments")]
        segments: u32,
    },
}

fn default_segments() -> u32 {
    24
}

fn one() -> [f32; 3] {
    [1.0; 3]
}

fn white() -> u32 {
    0xffffff
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrimitiveConfig {
    pub name: String,
    pub shape: Shape,
    pub position: [f32; 3],
    /// Euler angles in radians.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "one")]
    pub scale: [f32; 3],
    #[serde(default = "white")]
    pub color: u32,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub unlit: bool,
    /// Shows frames from the scene's video feed.
    #[serde(default)]
    pub video: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LightShape {
    Ambient,
    Directional {
        direction: [f32; 3],
    },
    Point {
        position: [f32; 3],
        #[serde(default)]
        range: f32,
    },
    Spot {
        position: [f32; 3],
        direction: [f32; 3],
        angle: f32,
        #[serde(default)]
        range: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LightConfig {
    pub name: String,
    #[serde(flatten)]
    pub shape: LightShape,
    #[serde(default = "white")]
    pub color: u32,
    pub intensity: f32,
    #[serde(default = "yes")]
    pub visible: bool,
}

/// A placement that reacts to hover and click.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub label: String,
    /// Page shown in the overlay on click. Targets without one only hover.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VehicleEntry {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DoorConfig {
    pub name: String,
    #[serde(default = "default_open_key")]
    pub open_key: String,
    #[serde(default = "default_close_key")]
    pub close_key: String,
    /// Clip to play; the last clip of the model when unset.
    #[serde(default)]
    pub clip: Option<String>,
    pub step: MixerStep,
}

fn default_open_key() -> String {
    "1".into()
}

fn default_close_key() -> String {
    "2".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticleConfig {
    pub name: String,
    pub preset: ParticlePreset,
    /// Spawn at this placement's position once it loads.
    #[serde(default)]
    pub anchor: Option<String>,
    /// Spawn here at startup. Ignored when `anchor` is set.
    #[serde(default)]
    pub origin: Option<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BobberConfig {
    pub name: String,
    pub amplitude: f32,
    /// Angular frequency in radians per second.
    pub frequency: f32,
    /// Yaw added every frame.
    #[serde(default)]
    pub spin: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HoverLightConfig {
    /// Placement whose hover toggles the light.
    pub name: String,
    /// Light from `[[lights]]`.
    pub light: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NeonConfig {
    pub light: String,
    #[serde(default = "default_neon_interval")]
    pub interval_ms: u64,
    pub palette: Vec<u32>,
}

fn default_neon_interval() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoConfig {
    /// Primitive that displays the frames.
    pub screen: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneDefinition {
    pub camera: CameraConfig,
    pub sky: SkyConfig,
    pub vehicle: VehicleConfig,
    pub placements: Vec<PlacementRecord>,
    pub primitives: Vec<PrimitiveConfig>,
    pub lights: Vec<LightConfig>,
    pub targets: Vec<TargetConfig>,
    pub vehicles: Vec<VehicleEntry>,
    pub door: Option<DoorConfig>,
    pub particles: Vec<ParticleConfig>,
    pub bobbers: Vec<BobberConfig>,
    pub hover_lights: Vec<HoverLightConfig>,
    pub neon: Option<NeonConfig>,
    pub video: Option<VideoConfig>,
}

impl SceneDefinition {
    pub fn from_toml(text: &str) -> Result<Self, SceneDefinitionError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneDefinitionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// The room scene shipped with the crate.
    pub fn builtin() -> Result<Self, SceneDefinitionError> {
        Self::from_toml(include_str!("../assets/scene.toml"))
    }

    /// Primitive meshes plus standalone lights and particle effects: every
    /// member that exists before any placement resolves.
    pub fn fixed_member_count(&self) -> usize {
        let standalone_particles = self
            .particles
            .iter()
            .filter(|p| p.anchor.is_none() && p.origin.is_some())
            .count();
        self.primitives.len() + self.lights.len() + standalone_particles
    }
}
