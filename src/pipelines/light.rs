//! Scene lights packed into one uniform buffer.

use wgpu::util::DeviceExt;

use crate::data_structures::scene_registry::{Light, LightKind};

/// Lights beyond this many are dropped from shading.
pub const MAX_LIGHTS: usize = 8;

const KIND_DIRECTIONAL: f32 = 0.0;
const KIND_POINT: f32 = 1.0;
const KIND_SPOT: f32 = 2.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    /// xyz position, w kind.
    position: [f32; 4],
    /// xyz direction the light travels, w cosine of the spot half angle.
    direction: [f32; 4],
    /// rgb colour, w intensity.
    color: [f32; 4],
    /// x range, 0 for unlimited.
    params: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    ambient: [f32; 4],
    // x holds the count; uniforms require 16 byte spacing
    count: [u32; 4],
    lights: [GpuLight; MAX_LIGHTS],
}

impl LightUniform {
    /// Ambient lights are summed, the rest fill the light array in
    /// registry order. Hidden lights are skipped.
    pub fn from_lights<'a>(lights: impl IntoIterator<Item = &'a Light>) -> Self {
        let mut uniform = Self {
            ambient: [0.0; 4],
            count: [0; 4],
            lights: [GpuLight::default(); MAX_LIGHTS],
        };
        let mut count = 0;
        for light in lights.into_iter().filter(|l| l.visible) {
            let [r, g, b] = light.color;
            let color = [r, g, b, light.intensity];
            let gpu = match light.kind {
                LightKind::Ambient => {
                    for (acc, c) in uniform.ambient.iter_mut().zip(light.color) {
                        *acc += c * light.intensity;
                    }
                    continue;
                }
                LightKind::Directional { direction: [x, y, z] } => GpuLight {
                    position: [0.0, 0.0, 0.0, KIND_DIRECTIONAL],
                    direction: [x, y, z, 0.0],
                    color,
                    params: [0.0; 4],
                },
                LightKind::Point { position: [x, y, z], range } => GpuLight {
                    position: [x, y, z, KIND_POINT],
                    direction: [0.0; 4],
                    color,
                    params: [range, 0.0, 0.0, 0.0],
                },
                LightKind::Spot {
                    position: [x, y, z],
                    direction: [dx, dy, dz],
                    angle,
                    range,
                } => GpuLight {
                    position: [x, y, z, KIND_SPOT],
                    direction: [dx, dy, dz, angle.cos()],
                    color,
                    params: [range, 0.0, 0.0, 0.0],
                },
            };
            if count == MAX_LIGHTS {
                log::trace!("light {} exceeds the {} light limit", light.name, MAX_LIGHTS);
                continue;
            }
            uniform.lights[count] = gpu;
            count += 1;
        }
        uniform.count[0] = count as u32;
        uniform
    }

    pub fn count(&self) -> usize {
        self.count[0] as usize
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = LightUniform::from_lights(std::iter::empty());
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("light_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Uploads only when something changed.
    pub fn update<'a>(&mut self, queue: &wgpu::Queue, lights: impl IntoIterator<Item = &'a Light>) {
        let uniform = LightUniform::from_lights(lights);
        if uniform != self.uniform {
            self.uniform = uniform;
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(name: &str, kind: LightKind, intensity: f32) -> Light {
        Light {
            name: name.into(),
            kind,
            color: [1.0, 1.0, 1.0],
            intensity,
            visible: true,
        }
    }

    #[test]
    fn ambient_lights_are_summed() {
        let lights = [
            light("a", LightKind::Ambient, 0.3),
            light("b", LightKind::Ambient, 0.4),
        ];
        let uniform = LightUniform::from_lights(&lights);
        assert_eq!(uniform.count(), 0);
        assert!((uniform.ambient[0] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn hidden_lights_are_skipped() {
        let mut spot = light(
            "flashlight",
            LightKind::Spot {
                position: [0.0, 2.0, 0.0],
                direction: [0.0, -1.0, 0.0],
                angle: std::f32::consts::FRAC_PI_4,
                range: 5.0,
            },
            5.0,
        );
        assert_eq!(LightUniform::from_lights([&spot]).count(), 1);
        spot.visible = false;
        assert_eq!(LightUniform::from_lights([&spot]).count(), 0);
    }

    #[test]
    fn extra_lights_are_dropped() {
        let lights: Vec<_> = (0..MAX_LIGHTS + 3)
            .map(|i| {
                light(
                    &format!("p{}", i),
                    LightKind::Point {
                        position: [0.0; 3],
                        range: 10.0,
                    },
                    1.0,
                )
            })
            .collect();
        assert_eq!(LightUniform::from_lights(&lights).count(), MAX_LIGHTS);
    }
}
