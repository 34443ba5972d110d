//! Decoded model data kept on the CPU.
//!
//! A [`ModelData`] is what the asset loader produces from a glTF binary (or
//! what a primitive builder produces for walls and furniture). It is shared
//! between every placement of the same asset; per placement state such as the
//! animated pose lives in the scene registry.

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix, Transform as _};

use crate::{
    data_structures::{
        geometry::{point, Aabb, Ray},
        instance::Instance,
    },
    resources::animation::AnimationClip,
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    /// Index into [`ModelData::materials`].
    pub material: usize,
    pub bounds: Aabb,
}

impl MeshData {
    pub fn new(name: &str, vertices: Vec<ModelVertex>, indices: Vec<u32>, material: usize) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| point(v.position)));
        Self {
            name: name.to_string(),
            vertices,
            indices,
            material,
            bounds,
        }
    }

    /// Closest hit of `ray` (given in mesh space) against the triangles.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        self.bounds.intersect(ray)?;
        self.indices
            .chunks_exact(3)
            .filter_map(|tri| {
                let v = |i: u32| self.vertices.get(i as usize).map(|v| point(v.position));
                ray.intersect_triangle(v(tri[0])?, v(tri[1])?, v(tri[2])?)
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Where the colour of a material comes from.
#[derive(Clone, Debug, Default)]
pub enum Surface {
    /// Flat colour only.
    #[default]
    Color,
    /// A decoded image, multiplied with the colour.
    Texture(Arc<image::RgbaImage>),
    /// Frames supplied by a [`crate::video::VideoFeed`]; `None` until the
    /// first frame arrives.
    Video(Option<Arc<image::RgbaImage>>),
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub surface: Surface,
    /// Ignores scene lighting.
    pub unlit: bool,
    pub emissive: [f32; 3],
    /// Bumped whenever the surface changes so GPU copies can be refreshed.
    pub revision: u32,
}

impl Material {
    pub fn color(name: &str, base_color: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            base_color,
            surface: Surface::Color,
            unlit: false,
            emissive: [0.0; 3],
            revision: 0,
        }
    }

    pub fn set_texture(&mut self, image: Arc<image::RgbaImage>) {
        self.surface = Surface::Texture(image);
        self.revision = self.revision.wrapping_add(1);
    }

    /// Replaces the current frame of a video surface.
    pub fn set_video_frame(&mut self, frame: Arc<image::RgbaImage>) {
        self.surface = Surface::Video(Some(frame));
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn is_video(&self) -> bool {
        matches!(self.surface, Surface::Video(_))
    }

    /// The image to sample, if any.
    pub fn image(&self) -> Option<&Arc<image::RgbaImage>> {
        match &self.surface {
            Surface::Texture(image) | Surface::Video(Some(image)) => Some(image),
            _ => None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::color("default", [0.8, 0.8, 0.8, 1.0])
    }
}

#[derive(Clone, Debug)]
pub struct ModelNode {
    pub name: Option<String>,
    pub local: Instance,
    /// Indices into [`ModelData::meshes`]; one per glTF primitive.
    pub meshes: Vec<usize>,
    pub children: Vec<usize>,
}

/// A decoded model: a node forest, meshes, materials and animation clips.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<Material>,
    pub animations: Vec<AnimationClip>,
}

impl ModelData {
    /// A single node model around one mesh. Used for primitives.
    pub fn from_mesh(mut mesh: MeshData, material: Material) -> Self {
        mesh.material = 0;
        Self {
            nodes: vec![ModelNode {
                name: Some(mesh.name.clone()),
                local: Instance::default(),
                meshes: vec![0],
                children: Vec::new(),
            }],
            roots: vec![0],
            meshes: vec![mesh],
            materials: vec![material],
            animations: Vec::new(),
        }
    }

    /// The rest pose: every node's local transform as authored.
    pub fn rest_pose(&self) -> Vec<Instance> {
        self.nodes.iter().map(|node| node.local).collect()
    }

    /// World matrices of all nodes carrying a mesh, in depth first order.
    ///
    /// `pose` overrides the node local transforms and must have one entry per
    /// node; missing entries fall back to the authored transform.
    pub fn mesh_world_matrices(&self, root: Matrix4<f32>, pose: &[Instance]) -> Vec<(usize, Matrix4<f32>)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, Matrix4<f32>)> =
            self.roots.iter().rev().map(|&idx| (idx, root)).collect();
        while let Some((idx, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                log::warn!("node index {} is out of range", idx);
                continue;
            };
            let local = pose.get(idx).unwrap_or(&node.local);
            let world = parent * local.to_matrix();
            out.extend(node.meshes.iter().map(|&mesh| (mesh, world)));
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
        out
    }

    /// Closest hit of a world space ray against every mesh of the model,
    /// including those of descendant nodes.
    pub fn intersect(&self, ray: &Ray, root: Matrix4<f32>, pose: &[Instance]) -> Option<f32> {
        self.mesh_world_matrices(root, pose)
            .into_iter()
            .filter_map(|(mesh_idx, world)| {
                let mesh = self.meshes.get(mesh_idx)?;
                mesh.bounds.transformed(&world).intersect(ray)?;
                let inverse = world.invert()?;
                let local_origin = inverse.transform_point(ray.origin);
                let local_target = inverse.transform_point(ray.at(1.0));
                let local = Ray::new(local_origin, local_target - local_origin);
                let t_local = mesh.intersect(&local)?;
                // distances are measured in world units
                let hit = world.transform_point(local.at(t_local));
                Some(cgmath::MetricSpace::distance(ray.origin, hit))
            })
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Point3, Vector3};

    use super::*;
    use crate::data_structures::geometry::cuboid;

    #[test]
    fn primitive_model_has_one_mesh_node() {
        let model = ModelData::from_mesh(cuboid("table", 1.6, 0.3, 0.9), Material::default());
        let worlds = model.mesh_world_matrices(Matrix4::identity(), &model.rest_pose());
        assert_eq!(worlds.len(), 1);
        assert_eq!(worlds[0].0, 0);
    }

    #[test]
    fn hit_distance_is_in_world_units() {
        let model = ModelData::from_mesh(cuboid("block", 1.0, 1.0, 1.0), Material::default());
        let root = Matrix4::from_translation(Vector3::new(0.0, 0.0, -2.0))
            * Matrix4::from_scale(2.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let t = model.intersect(&ray, root, &model.rest_pose()).unwrap();
        // front face sits at z = -2 + 1
        assert!((t - 6.0).abs() < 1e-4, "{}", t);
    }

    #[test]
    fn child_nodes_inherit_parent_transform() {
        let mut model = ModelData::from_mesh(cuboid("rotor", 0.2, 0.2, 0.2), Material::default());
        model.nodes[0].meshes.clear();
        model.nodes[0].children = vec![1];
        model.nodes.push(ModelNode {
            name: Some("blade".into()),
            local: Instance {
                position: Vector3::new(3.0, 0.0, 0.0),
                ..Default::default()
            },
            meshes: vec![0],
            children: Vec::new(),
        });
        let root = Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
        let worlds = model.mesh_world_matrices(root, &model.rest_pose());
        assert_eq!(worlds.len(), 1);
        assert_eq!(worlds[0].1.w.truncate(), Vector3::new(3.0, 1.0, 0.0));
        assert_eq!(model.node_by_name("blade"), Some(1));
    }
}
