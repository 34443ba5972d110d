//! Transformation data for scene members and GPU instancing.
//!
//! Two transform types live here:
//!
//! - [`Transform`] is the root transform of a scene member. Its rotation is kept
//!   as per-axis Euler angles (applied in X, Y, Z order) so that placements and
//!   the vehicle controller can set or nudge a single axis without disturbing
//!   the others.
//! - [`Instance`] is a quaternion based transform used for model nodes,
//!   animation keyframes and the raw per-instance data uploaded to the GPU.

use cgmath::{InnerSpace, One, Rad, Rotation, Rotation3, SquareMatrix};

use crate::data_structures::model::Vertex;

/// Root transform of a scene member.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: [f32; 3],
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: [0.0; 3],
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn quaternion(&self) -> cgmath::Quaternion<f32> {
        cgmath::Quaternion::from_angle_x(Rad(self.rotation[0]))
            * cgmath::Quaternion::from_angle_y(Rad(self.rotation[1]))
            * cgmath::Quaternion::from_angle_z(Rad(self.rotation[2]))
    }

    /// Moves along the local Z axis. Scale does not affect the distance.
    pub fn translate_z(&mut self, distance: f32) {
        let axis = self.quaternion().rotate_vector(cgmath::Vector3::unit_z());
        self.position += axis.normalize() * distance;
    }

    pub fn yaw(&self) -> f32 {
        self.rotation[1]
    }

    pub fn add_yaw(&mut self, delta: f32) {
        self.rotation[1] += delta;
    }

    pub fn to_instance(&self) -> Instance {
        Instance {
            position: self.position,
            rotation: self.quaternion(),
            scale: self.scale,
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        self.to_instance().to_matrix()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

impl InstanceRaw {
    /// Raw data for an arbitrary world matrix. The normal matrix is the
    /// inverse transpose so non-uniform scale keeps normals perpendicular.
    pub fn from_matrix(world: cgmath::Matrix4<f32>) -> Self {
        let linear = cgmath::Matrix3::new(
            world.x.x, world.x.y, world.x.z, world.y.x, world.y.y, world.y.z, world.z.x,
            world.z.y, world.z.z,
        );
        let normal = linear
            .invert()
            .map(|inv| {
                use cgmath::Matrix;
                inv.transpose()
            })
            .unwrap_or(cgmath::Matrix3::identity());
        Self {
            model: world.into(),
            normal: normal.into(),
            handedness: world.determinant().signum(),
        }
    }
}

/**
 * As we store vertex data directly in the GPU memory we need to tell what the bytes refer to.
 *
 * Stride layout here: position + rotation + scale as 4x4 matrix (hence the four 4d vectors)
 * followed by the 3x3 normal matrix and the handedness.
 */
impl Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Shaders only advance to the next entry when a new instance starts
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: cgmath::Vector3<f32>, b: cgmath::Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn translate_z_without_rotation_moves_along_world_z() {
        let mut t = Transform::new();
        t.translate_z(-0.2);
        assert!(close(t.position, cgmath::Vector3::new(0.0, 0.0, -0.2)));
    }

    #[test]
    fn translate_z_follows_yaw() {
        let mut t = Transform::new();
        t.add_yaw(FRAC_PI_2);
        t.translate_z(1.0);
        // +Z rotated a quarter turn about +Y points along +X
        assert!(close(t.position, cgmath::Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn translate_z_ignores_scale() {
        let mut t = Transform::new();
        t.scale = cgmath::Vector3::new(0.18, 0.18, 0.18);
        t.translate_z(2.0);
        assert!(close(t.position, cgmath::Vector3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn identity_transform_has_identity_matrix() {
        assert_eq!(Transform::new().to_matrix(), cgmath::Matrix4::identity());
    }
}
