//! The flat, append-only collection of everything in the scene.
//!
//! Members are addressed by [`MemberId`], which is simply the insertion index.
//! There is no removal, so an id stays valid for the lifetime of the registry
//! and a renderer can track what it has uploaded with a single high-water mark.

use std::sync::Arc;

use crate::data_structures::{
    instance::{Instance, Transform},
    model::ModelData,
    particles::ParticleEffect,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub usize);

/// Where a model member came from.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberKind {
    /// Built in code from the scene file's primitive list.
    Primitive(String),
    /// Resolved from a placement; holds the asset URL.
    Loaded(String),
}

/// A model in the scene with its own transform and animated pose.
#[derive(Clone, Debug)]
pub struct ModelMember {
    pub kind: MemberKind,
    pub model: Arc<ModelData>,
    pub transform: Transform,
    /// One local transform per model node.
    pub pose: Vec<Instance>,
    pub visible: bool,
}

impl ModelMember {
    pub fn world_matrix(&self) -> cgmath::Matrix4<f32> {
        self.transform.to_matrix()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional {
        direction: [f32; 3],
    },
    Point {
        position: [f32; 3],
        range: f32,
    },
    Spot {
        position: [f32; 3],
        direction: [f32; 3],
        /// Half angle of the cone in radians.
        angle: f32,
        range: f32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub visible: bool,
}

#[derive(Debug)]
pub enum SceneMember {
    Model(ModelMember),
    Particles(ParticleEffect),
    Light(Light),
}

impl SceneMember {
    /// A model member in its rest pose.
    pub fn model(kind: MemberKind, model: Arc<ModelData>, transform: Transform) -> Self {
        let pose = model.rest_pose();
        SceneMember::Model(ModelMember {
            kind,
            model,
            transform,
            pose,
            visible: true,
        })
    }

    pub fn as_model(&self) -> Option<&ModelMember> {
        match self {
            SceneMember::Model(member) => Some(member),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut ModelMember> {
        match self {
            SceneMember::Model(member) => Some(member),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneRegistry {
    members: Vec<SceneMember>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member. The member is moved in, so it cannot be inserted twice.
    pub fn insert(&mut self, member: SceneMember) -> MemberId {
        self.members.push(member);
        MemberId(self.members.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: MemberId) -> Option<&SceneMember> {
        self.members.get(id.0)
    }

    pub fn get_mut(&mut self, id: MemberId) -> Option<&mut SceneMember> {
        self.members.get_mut(id.0)
    }

    pub fn model(&self, id: MemberId) -> Option<&ModelMember> {
        self.get(id).and_then(SceneMember::as_model)
    }

    pub fn model_mut(&mut self, id: MemberId) -> Option<&mut ModelMember> {
        self.get_mut(id).and_then(SceneMember::as_model_mut)
    }

    pub fn transform_mut(&mut self, id: MemberId) -> Option<&mut Transform> {
        self.model_mut(id).map(|member| &mut member.transform)
    }

    pub fn pose(&self, id: MemberId) -> Option<&[Instance]> {
        self.model(id).map(|member| member.pose.as_slice())
    }

    pub fn pose_mut(&mut self, id: MemberId) -> Option<&mut [Instance]> {
        self.model_mut(id).map(|member| member.pose.as_mut_slice())
    }

    pub fn light_mut(&mut self, id: MemberId) -> Option<&mut Light> {
        match self.get_mut(id)? {
            SceneMember::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MemberId, &SceneMember)> {
        self.members
            .iter()
            .enumerate()
            .map(|(idx, member)| (MemberId(idx), member))
    }

    pub fn particles_mut(&mut self) -> impl Iterator<Item = &mut ParticleEffect> {
        self.members.iter_mut().filter_map(|member| match member {
            SceneMember::Particles(effect) => Some(effect),
            _ => None,
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.members.iter().filter_map(|member| match member {
            SceneMember::Light(light) => Some(light),
            _ => None,
        })
    }

    /// Number of members resolved from placements.
    pub fn loaded_count(&self) -> usize {
        self.members
            .iter()
            .filter(|member| {
                matches!(
                    member,
                    SceneMember::Model(ModelMember {
                        kind: MemberKind::Loaded(_),
                        ..
                    })
                )
            })
            .count()
    }
}
