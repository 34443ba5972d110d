//! Everything the running scene owns, and the single place where loaded
//! placements enter it.

use std::{collections::HashMap, sync::Arc};

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    animators::{Animator, Bobber, NeonCycle},
    camera::CameraRig,
    config::{LightConfig, LightShape, PrimitiveConfig, SceneDefinition, Shape, rgb},
    data_structures::{
        geometry::{cuboid, cylinder, plane},
        instance::Transform,
        mixer::{AnimationMixer, Door},
        model::{Material, ModelData, Surface},
        particles::ParticleEffect,
        scene_registry::{Light, LightKind, MemberId, MemberKind, SceneMember, SceneRegistry},
    },
    pick::InputDispatcher,
    resources::{LoadOutcome, TextureOutcome},
    ui::UiCommand,
    vehicle::{VehicleController, VehicleRoster},
    video::{self, VideoScreen},
};

fn primitive_model(cfg: &PrimitiveConfig) -> ModelData {
    let mesh = match cfg.shape {
        Shape::Plane { width, height } => plane(&cfg.name, width, height),
        Shape::Box { width, height, depth } => cuboid(&cfg.name, width, height, depth),
        Shape::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        } => cylinder(&cfg.name, radius_top, radius_bottom, height, segments),
    };
    let [r, g, b] = rgb(cfg.color);
    let mut material = Material::color(&cfg.name, [r, g, b, 1.0]);
    material.unlit = cfg.unlit;
    if cfg.video {
        material.surface = Surface::Video(None);
    }
    ModelData::from_mesh(mesh, material)
}

fn light(cfg: &LightConfig) -> Light {
    let kind = match cfg.shape {
        LightShape::Ambient => LightKind::Ambient,
        LightShape::Directional { direction } => LightKind::Directional { direction },
        LightShape::Point { position, range } => LightKind::Point { position, range },
        LightShape::Spot {
            position,
            direction,
            angle,
            range,
        } => LightKind::Spot {
            position,
            direction,
            angle,
            range,
        },
    };
    Light {
        name: cfg.name.clone(),
        kind,
        color: rgb(cfg.color),
        intensity: cfg.intensity,
        visible: cfg.visible,
    }
}

pub struct SceneContext {
    pub definition: SceneDefinition,
    pub registry: SceneRegistry,
    pub rig: CameraRig,
    pub vehicle: VehicleController,
    pub vehicles: VehicleRoster,
    pub input: InputDispatcher,
    pub door: Option<Door>,
    pub video: Option<VideoScreen>,
    pub animators: Vec<Box<dyn Animator>>,
    primitives: HashMap<String, MemberId>,
    rng: StdRng,
}

impl SceneContext {
    pub fn new(definition: SceneDefinition, width: u32, height: u32) -> Self {
        Self::with_rng(definition, width, height, StdRng::from_rng(&mut rand::rng()))
    }

    /// Builds the primitives, lights and standalone particle effects. Loaded
    /// placements arrive later through [`Self::insert_outcome`].
    pub fn with_rng(definition: SceneDefinition, width: u32, height: u32, rng: StdRng) -> Self {
        let mut scene = Self {
            registry: SceneRegistry::new(),
            rig: CameraRig::from_config(&definition.camera, width, height),
            vehicle: VehicleController::new(&definition.vehicle),
            vehicles: VehicleRoster::new(definition.vehicles.clone()),
            input: InputDispatcher::new(&definition.targets, &definition.hover_lights, width, height),
            door: None,
            video: None,
            animators: Vec::new(),
            primitives: HashMap::new(),
            rng,
            definition,
        };

        for cfg in &scene.definition.primitives {
            let transform = Transform {
                position: cfg.position.into(),
                rotation: cfg.rotation,
                scale: cfg.scale.into(),
            };
            let id = scene.registry.insert(SceneMember::model(
                MemberKind::Primitive(cfg.name.clone()),
                Arc::new(primitive_model(cfg)),
                transform,
            ));
            scene.primitives.insert(cfg.name.clone(), id);
        }

        let mut lights = HashMap::new();
        for cfg in &scene.definition.lights {
            let id = scene.registry.insert(SceneMember::Light(light(cfg)));
            scene.input.bind_light(&cfg.name, id);
            lights.insert(cfg.name.clone(), id);
        }

        for cfg in &scene.definition.particles {
            if let (None, Some(origin)) = (&cfg.anchor, cfg.origin) {
                let effect = ParticleEffect::new(&cfg.name, origin, cfg.preset.params(), &mut scene.rng);
                scene.registry.insert(SceneMember::Particles(effect));
            }
        }

        if let Some(neon) = &scene.definition.neon {
            match lights.get(&neon.light) {
                Some(&id) => scene.animators.push(Box::new(NeonCycle::new(id, neon))),
                None => log::warn!("neon light {} is not defined", neon.light),
            }
        }

        if let Some(cfg) = &scene.definition.video {
            match scene.primitives.get(&cfg.screen) {
                Some(&id) => scene.video = Some(VideoScreen::new(id, video::open_feed(&cfg.source))),
                None => log::warn!("video screen {} is not defined", cfg.screen),
            }
        }

        log::info!(
            "scene ready with {} members, {} placements pending",
            scene.registry.len(),
            scene.definition.placements.len()
        );
        scene
    }

    /// `(primitive name, image url)` for every textured primitive.
    pub fn texture_requests(&self) -> Vec<(String, String)> {
        self.definition
            .primitives
            .iter()
            .filter_map(|p| Some((p.name.clone(), p.texture.clone()?)))
            .collect()
    }

    /// Inserts a resolved placement and attaches the roles bound to its
    /// name. A failed load logs one error and leaves the scene untouched.
    pub fn insert_outcome(&mut self, outcome: LoadOutcome) -> Option<MemberId> {
        let LoadOutcome { index, record, result } = outcome;
        let model = match result {
            Ok(model) => model,
            Err(e) => {
                log::error!("placement #{} ({}) failed: {}", index, record.asset, e);
                return None;
            }
        };
        let id = self.registry.insert(SceneMember::model(
            MemberKind::Loaded(record.asset.clone()),
            Arc::new(model),
            record.transform(),
        ));
        log::info!("loaded {} as member {}", record.asset, id.0);
        if let Some(name) = &record.name {
            self.bind_roles(name, id);
        }
        Some(id)
    }

    fn bind_roles(&mut self, name: &str, id: MemberId) {
        self.vehicles.bind(name, id);
        self.input.bind(name, id);

        let Some(member) = self.registry.model(id) else {
            return;
        };
        let position: [f32; 3] = member.transform.position.into();
        let model = member.model.clone();

        if let Some(cfg) = self.definition.door.as_ref().filter(|d| d.name == name) {
            let clip = match &cfg.clip {
                Some(clip) => model.animations.iter().find(|a| &a.name == clip),
                None => model.animations.last(),
            };
            match clip {
                Some(clip) => {
                    self.door = Some(Door::new(AnimationMixer::new(id, clip.clone(), cfg.step)));
                }
                None => log::warn!("door {} has no animation to play", name),
            }
        }

        for cfg in self.definition.particles.iter().filter(|p| p.anchor.as_deref() == Some(name)) {
            let effect = ParticleEffect::new(&cfg.name, position, cfg.preset.params(), &mut self.rng);
            self.registry.insert(SceneMember::Particles(effect));
        }

        for cfg in self.definition.bobbers.iter().filter(|b| b.name == name) {
            self.animators.push(Box::new(Bobber::new(id, position[1], cfg)));
        }
    }

    /// Puts a loaded image on a primitive. A failure logs once and the
    /// primitive keeps its flat colour.
    pub fn apply_texture(&mut self, outcome: TextureOutcome) {
        let image = match outcome.result {
            Ok(image) => image,
            Err(e) => {
                log::error!("texture for {} failed: {}", outcome.primitive, e);
                return;
            }
        };
        let Some(member) = self
            .primitives
            .get(&outcome.primitive)
            .and_then(|&id| self.registry.model_mut(id))
        else {
            log::warn!("no primitive named {}", outcome.primitive);
            return;
        };
        let model = Arc::make_mut(&mut member.model);
        for material in &mut model.materials {
            material.set_texture(image.clone());
        }
    }

    pub fn primitive(&self, name: &str) -> Option<MemberId> {
        self.primitives.get(name).copied()
    }

    /// Movement flags, door keys and vehicle switching.
    pub fn key(&mut self, key: &str, pressed: bool) -> Vec<UiCommand> {
        self.vehicle.key(key, pressed);
        if !pressed {
            return Vec::new();
        }
        if let (Some(door), Some(cfg)) = (&mut self.door, &self.definition.door) {
            if key == cfg.open_key && door.open() {
                log::info!("opening {}", cfg.name);
            } else if key == cfg.close_key && door.close() {
                log::info!("closing {}", cfg.name);
            }
        }
        self.vehicles
            .switch(key)
            .map(UiCommand::Notify)
            .into_iter()
            .collect()
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) -> Vec<UiCommand> {
        self.input.pointer_moved(&mut self.registry, &self.rig, x, y)
    }

    pub fn clicked(&mut self, x: f64, y: f64) -> Vec<UiCommand> {
        self.input.clicked(&self.registry, &self.rig, x, y)
    }

    pub fn touch(&mut self, phase: winit::event::TouchPhase, x: f64, y: f64) -> Vec<UiCommand> {
        self.input.touch(&mut self.registry, &self.rig, phase, x, y)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Vec<UiCommand> {
        self.rig.projection.resize(width, height);
        self.input.resize(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParticleConfig, PlacementRecord};
    use crate::data_structures::particles::ParticlePreset;
    use crate::resources::LoadError;

    fn scene(definition: SceneDefinition) -> SceneContext {
        SceneContext::with_rng(definition, 800, 600, StdRng::seed_from_u64(1))
    }

    #[test]
    fn builtin_fixed_members_are_built() {
        let definition = SceneDefinition::builtin().unwrap();
        let expected = definition.fixed_member_count();
        let ctx = scene(definition);
        assert_eq!(ctx.registry.len(), expected);
        assert_eq!(ctx.registry.loaded_count(), 0);
        assert!(ctx.video.is_some());
    }

    #[test]
    fn failed_texture_keeps_flat_colour() {
        let definition = SceneDefinition::from_toml(
            r#"
            [[primitives]]
            name = "floor"
            shape = { kind = "plane", width = 5.0, height = 5.0 }
            position = [0.0, 0.01, 0.0]
            texture = "stone.jpg"
            "#,
        )
        .unwrap();
        let mut ctx = scene(definition);
        assert_eq!(ctx.texture_requests(), vec![("floor".to_string(), "stone.jpg".to_string())]);
        ctx.apply_texture(TextureOutcome {
            primitive: "floor".into(),
            result: Err(LoadError::decode("stone.jpg", "truncated")),
        });
        let id = ctx.primitive("floor").unwrap();
        assert!(ctx.registry.model(id).unwrap().model.materials[0].image().is_none());

        ctx.apply_texture(TextureOutcome {
            primitive: "floor".into(),
            result: Ok(Arc::new(image::RgbaImage::new(1, 1))),
        });
        assert!(ctx.registry.model(id).unwrap().model.materials[0].image().is_some());
    }

    #[test]
    fn anchored_particles_spawn_at_the_placement() {
        let mut definition = SceneDefinition::default();
        definition.particles.push(ParticleConfig {
            name: "steam".into(),
            preset: ParticlePreset::Steam,
            anchor: Some("window".into()),
            origin: None,
        });
        let mut ctx = scene(definition);
        assert!(ctx.registry.is_empty());
        let mut record = PlacementRecord::new("window.glb", [-2.3, 0.5, 0.03], [0.08, 0.06, 0.05]);
        record.name = Some("window".into());
        let id = ctx.insert_outcome(LoadOutcome {
            index: 0,
            record,
            result: Ok(ModelData::from_mesh(cuboid("window", 1.0, 1.0, 1.0), Material::default())),
        });
        assert_eq!(id, Some(MemberId(0)));
        assert_eq!(ctx.registry.len(), 2);
        let effect = ctx.registry.particles_mut().next().unwrap();
        assert_eq!(effect.origin, [-2.3, 0.5, 0.03]);
    }
}
