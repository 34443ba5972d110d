//! Keyframe animation playback on loaded instances.

use instant::Duration;
use serde::Deserialize;

use crate::{
    data_structures::scene_registry::{MemberId, SceneRegistry},
    resources::animation::AnimationClip,
};

/// How far a mixer advances each frame.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixerStep {
    /// A constant number of seconds per frame regardless of elapsed time.
    Fixed(f32),
    /// The real frame delta.
    Delta,
}

impl MixerStep {
    pub fn seconds(&self, dt: Duration) -> f32 {
        match self {
            MixerStep::Fixed(secs) => *secs,
            MixerStep::Delta => dt.as_secs_f32(),
        }
    }
}

/// Playback state of one clip. Plays once and holds the final frame.
#[derive(Clone, Debug)]
pub struct AnimationAction {
    pub clip: AnimationClip,
    pub time: f32,
    /// 1.0 plays forwards, -1.0 backwards.
    pub time_scale: f32,
    pub playing: bool,
}

impl AnimationAction {
    pub fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            playing: false,
        }
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
        self.time_scale = 1.0;
        self.playing = false;
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Plays from the end back to the start.
    pub fn play_reverse(&mut self) {
        self.time = self.clip.duration;
        self.time_scale = -1.0;
        self.playing = true;
    }

    pub fn is_finished(&self) -> bool {
        !self.playing
    }

    fn advance(&mut self, seconds: f32) {
        if !self.playing {
            return;
        }
        self.time += seconds * self.time_scale;
        if self.time >= self.clip.duration {
            self.time = self.clip.duration;
            self.playing = false;
        } else if self.time <= 0.0 {
            self.time = 0.0;
            self.playing = false;
        }
    }
}

/// Drives one action on the pose of one registry member.
#[derive(Debug)]
pub struct AnimationMixer {
    pub member: MemberId,
    pub action: AnimationAction,
    pub step: MixerStep,
}

impl AnimationMixer {
    pub fn new(member: MemberId, clip: AnimationClip, step: MixerStep) -> Self {
        if let MixerStep::Fixed(secs) = step {
            log::warn!(
                "mixer for clip '{}' advances a fixed {}s per frame; playback speed follows the display refresh rate",
                clip.name,
                secs
            );
        }
        Self {
            member,
            action: AnimationAction::new(clip),
            step,
        }
    }

    pub fn update(&mut self, registry: &mut SceneRegistry, dt: Duration) {
        // a clamped action keeps its last pose, nothing to write
        if !self.action.playing {
            return;
        }
        self.action.advance(self.step.seconds(dt));
        if let Some(pose) = registry.pose_mut(self.member) {
            self.action.clip.sample(self.action.time, pose);
        }
    }
}

/// The garage door: one mixer plus the open/closed flag toggled by keys.
#[derive(Debug)]
pub struct Door {
    pub mixer: AnimationMixer,
    pub open: bool,
}

impl Door {
    pub fn new(mixer: AnimationMixer) -> Self {
        Self { mixer, open: false }
    }

    /// Plays the clip from the start unless already open.
    pub fn open(&mut self) -> bool {
        if self.open {
            return false;
        }
        self.mixer.action.reset();
        self.mixer.action.play();
        self.open = true;
        true
    }

    /// Plays the clip backwards from the end unless already closed.
    pub fn close(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.mixer.action.play_reverse();
        self.open = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::{
            geometry::cuboid,
            instance::Transform,
            model::{Material, ModelData},
            scene_registry::{MemberKind, SceneMember},
        },
        resources::animation::{Channel, Keyframes},
    };
    use std::sync::Arc;

    fn setup() -> (SceneRegistry, Door) {
        let mut model = ModelData::from_mesh(cuboid("door", 1.0, 1.0, 0.1), Material::default());
        let clip = AnimationClip::new(
            "lift",
            vec![Channel {
                node: 0,
                timestamps: vec![0.0, 1.0],
                keyframes: Keyframes::Translation(vec![[0.0, 0.0, 0.0].into(), [0.0, 2.0, 0.0].into()]),
            }],
        );
        model.animations.push(clip.clone());
        let mut registry = SceneRegistry::new();
        let id = registry.insert(SceneMember::model(
            MemberKind::Loaded("garage_door.glb".into()),
            Arc::new(model),
            Transform::default(),
        ));
        let door = Door::new(AnimationMixer::new(id, clip, MixerStep::Fixed(0.25)));
        (registry, door)
    }

    #[test]
    fn fixed_step_ignores_frame_delta() {
        let (mut registry, mut door) = setup();
        assert!(door.open());
        door.mixer.update(&mut registry, Duration::from_secs(5));
        assert_eq!(door.mixer.action.time, 0.25);
    }

    #[test]
    fn open_plays_once_and_clamps() {
        let (mut registry, mut door) = setup();
        door.open();
        for _ in 0..10 {
            door.mixer.update(&mut registry, Duration::from_millis(16));
        }
        assert!(door.mixer.action.is_finished());
        assert_eq!(door.mixer.action.time, 1.0);
        let pose = registry.pose(door.mixer.member).unwrap();
        assert_eq!(pose[0].position.y, 2.0);
    }

    #[test]
    fn open_twice_is_ignored_and_close_rewinds() {
        let (mut registry, mut door) = setup();
        assert!(door.open());
        assert!(!door.open());
        for _ in 0..4 {
            door.mixer.update(&mut registry, Duration::ZERO);
        }
        assert!(door.close());
        assert!(!door.close());
        for _ in 0..4 {
            door.mixer.update(&mut registry, Duration::ZERO);
        }
        assert_eq!(door.mixer.action.time, 0.0);
        assert_eq!(registry.pose(door.mixer.member).unwrap()[0].position.y, 0.0);
    }

    #[test]
    fn delta_step_uses_elapsed_time() {
        assert_eq!(MixerStep::Delta.seconds(Duration::from_millis(500)), 0.5);
    }
}
