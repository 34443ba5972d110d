//! Pointer picking against named scene members.
//!
//! Picking is a CPU ray cast: the pointer is converted to normalized device
//! coordinates, a ray is shot from the camera and every tracked target is
//! tested in its configured order. The first target hit wins even when a
//! later one is closer to the camera.

use winit::event::TouchPhase;

use crate::{
    camera::CameraRig,
    config::{HoverLightConfig, TargetConfig},
    data_structures::{
        geometry::Ray,
        scene_registry::{MemberId, SceneRegistry},
    },
    ui::{OverlayRect, UiCommand},
};

/// Label offset from the pointer in pixels.
const LABEL_OFFSET: f64 = 10.0;

/// Closest hit distance of `ray` against a model member and all its meshes.
pub fn member_hit(registry: &SceneRegistry, id: MemberId, ray: &Ray) -> Option<f32> {
    let member = registry.model(id)?;
    if !member.visible {
        return None;
    }
    member
        .model
        .intersect(ray, member.world_matrix(), &member.pose)
}

#[derive(Clone, Debug)]
struct Target {
    config: TargetConfig,
    member: Option<MemberId>,
}

#[derive(Clone, Debug)]
struct HoverLight {
    config: HoverLightConfig,
    member: Option<MemberId>,
    light: Option<MemberId>,
}

#[derive(Debug)]
pub struct InputDispatcher {
    targets: Vec<Target>,
    hover_lights: Vec<HoverLight>,
    width: u32,
    height: u32,
    overlay: Option<OverlayRect>,
    label_shown: bool,
}

impl InputDispatcher {
    pub fn new(targets: &[TargetConfig], hover_lights: &[HoverLightConfig], width: u32, height: u32) -> Self {
        Self {
            targets: targets
                .iter()
                .cloned()
                .map(|config| Target { config, member: None })
                .collect(),
            hover_lights: hover_lights
                .iter()
                .cloned()
                .map(|config| HoverLight {
                    config,
                    member: None,
                    light: None,
                })
                .collect(),
            width: width.max(1),
            height: height.max(1),
            overlay: None,
            label_shown: false,
        }
    }

    /// A placement named `name` has loaded as `id`.
    pub fn bind(&mut self, name: &str, id: MemberId) {
        for target in self.targets.iter_mut().filter(|t| t.config.name == name) {
            target.member = Some(id);
        }
        for hover in self.hover_lights.iter_mut().filter(|h| h.config.name == name) {
            hover.member = Some(id);
        }
    }

    /// The light named `name` was added as `id`.
    pub fn bind_light(&mut self, name: &str, id: MemberId) {
        for hover in self.hover_lights.iter_mut().filter(|h| h.config.light == name) {
            hover.light = Some(id);
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.targets
            .iter()
            .any(|t| t.config.name == name && t.member.is_some())
    }

    pub fn overlay(&self) -> Option<OverlayRect> {
        self.overlay
    }

    /// Pixel position to normalized device coordinates, y up.
    pub fn ndc(&self, x: f64, y: f64) -> (f32, f32) {
        (
            (x / self.width as f64 * 2.0 - 1.0) as f32,
            (-(y / self.height as f64) * 2.0 + 1.0) as f32,
        )
    }

    /// Index of the first target in priority order that the ray hits.
    /// Targets whose placement has not loaded are skipped.
    pub fn hit_test(&self, registry: &SceneRegistry, ray: &Ray) -> Option<usize> {
        self.targets.iter().position(|target| {
            target
                .member
                .is_some_and(|id| member_hit(registry, id, ray).is_some())
        })
    }

    pub fn pointer_moved(&mut self, registry: &mut SceneRegistry, rig: &CameraRig, x: f64, y: f64) -> Vec<UiCommand> {
        let hit = rig.ray(self.ndc(x, y)).and_then(|ray| {
            self.update_hover_lights(registry, &ray);
            self.hit_test(registry, &ray)
        });

        let mut out = Vec::new();
        match hit {
            Some(idx) => {
                out.push(UiCommand::ShowLabel {
                    text: self.targets[idx].config.label.clone(),
                    x: x + LABEL_OFFSET,
                    y: y + LABEL_OFFSET,
                });
                self.label_shown = true;
            }
            None if self.label_shown => {
                out.push(UiCommand::HideLabel);
                self.label_shown = false;
            }
            None => {}
        }
        out
    }

    fn update_hover_lights(&self, registry: &mut SceneRegistry, ray: &Ray) {
        for hover in &self.hover_lights {
            let (Some(member), Some(light)) = (hover.member, hover.light) else {
                continue;
            };
            let lit = member_hit(registry, member, ray).is_some();
            if let Some(light) = registry.light_mut(light) {
                if light.visible != lit {
                    log::trace!("light {} visible: {}", light.name, lit);
                }
                light.visible = lit;
            }
        }
    }

    /// A click while an overlay is open only dismisses it when it lands
    /// outside. Otherwise the winning target opens its page.
    pub fn clicked(&mut self, registry: &SceneRegistry, rig: &CameraRig, x: f64, y: f64) -> Vec<UiCommand> {
        if let Some(rect) = self.overlay {
            if rect.contains(x, y) {
                return Vec::new();
            }
            self.overlay = None;
            return vec![UiCommand::CloseOverlay];
        }
        let Some(ray) = rig.ray(self.ndc(x, y)) else {
            return Vec::new();
        };
        let Some(idx) = self.hit_test(registry, &ray) else {
            return Vec::new();
        };
        let target = &self.targets[idx].config;
        let Some(url) = target.url.clone() else {
            return Vec::new();
        };
        log::info!("opening {} for {}", url, target.name);
        let rect = OverlayRect::for_viewport(self.width, self.height);
        self.overlay = Some(rect);
        vec![UiCommand::OpenOverlay { url, rect }]
    }

    /// Touch start acts as a click, touch move as a pointer move.
    pub fn touch(
        &mut self,
        registry: &mut SceneRegistry,
        rig: &CameraRig,
        phase: TouchPhase,
        x: f64,
        y: f64,
    ) -> Vec<UiCommand> {
        match phase {
            TouchPhase::Started => self.clicked(registry, rig, x, y),
            TouchPhase::Moved => self.pointer_moved(registry, rig, x, y),
            TouchPhase::Ended | TouchPhase::Cancelled => Vec::new(),
        }
    }

    /// The surface closed the overlay on its own.
    pub fn overlay_dismissed(&mut self) {
        self.overlay = None;
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Vec<UiCommand> {
        self.width = width.max(1);
        self.height = height.max(1);
        match self.overlay {
            Some(_) => {
                let rect = OverlayRect::for_viewport(self.width, self.height);
                self.overlay = Some(rect);
                vec![UiCommand::ResizeOverlay(rect)]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> InputDispatcher {
        let targets = vec![TargetConfig {
            name: "gameboy".into(),
            label: "Game Boy".into(),
            url: Some("https://marioallstars.vercel.app".into()),
        }];
        InputDispatcher::new(&targets, &[], 800, 600)
    }

    #[test]
    fn label_hides_when_no_ray_can_be_cast() {
        let mut d = dispatcher();
        d.label_shown = true;
        let mut registry = SceneRegistry::new();
        let mut rig = CameraRig::from_config(&crate::config::CameraConfig::default(), 800, 600);
        rig.camera.target = rig.camera.eye;
        assert!(rig.ray((0.0, 0.0)).is_none());
        assert_eq!(d.pointer_moved(&mut registry, &rig, 400.0, 300.0), vec![UiCommand::HideLabel]);
        assert!(d.pointer_moved(&mut registry, &rig, 410.0, 300.0).is_empty());
    }

    #[test]
    fn ndc_corners() {
        let d = dispatcher();
        assert_eq!(d.ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(d.ndc(800.0, 600.0), (1.0, -1.0));
        assert_eq!(d.ndc(400.0, 300.0), (0.0, 0.0));
    }

    #[test]
    fn unbound_targets_never_hit() {
        let d = dispatcher();
        let registry = SceneRegistry::new();
        let ray = Ray::new(cgmath::Point3::new(0.0, 0.0, 5.0), cgmath::Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(d.hit_test(&registry, &ray), None);
        assert!(!d.is_bound("gameboy"));
    }

    #[test]
    fn resize_moves_an_open_overlay() {
        let mut d = dispatcher();
        assert!(d.resize(500, 500).is_empty());
        d.overlay = Some(OverlayRect::for_viewport(500, 500));
        let out = d.resize(1000, 1000);
        assert_eq!(
            out,
            vec![UiCommand::ResizeOverlay(OverlayRect::for_viewport(1000, 1000))]
        );
    }
}
