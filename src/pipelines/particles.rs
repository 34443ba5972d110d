//! Camera facing round sprites for particle effects.

use crate::{
    data_structures::{particles::ParticleParams, texture::Texture},
    pipelines::basic::mk_render_pipeline,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleUniform {
    color: [f32; 4],
    /// xyz camera right, w sprite size.
    right: [f32; 4],
    up: [f32; 4],
}

impl ParticleUniform {
    pub fn new(params: &ParticleParams, right: [f32; 3], up: [f32; 3]) -> Self {
        let [rx, ry, rz] = right;
        let [ux, uy, uz] = up;
        Self {
            color: params.color,
            right: [rx, ry, rz, params.size],
            up: [ux, uy, uz, 0.0],
        }
    }
}

/// One position per particle, advanced once per sprite.
pub fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    }
}

pub fn particle_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("particle_bind_group_layout"),
    })
}

pub fn mk_particle_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    particle_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Particle Pipeline Layout"),
        // camera stays at group 1 as in the model pipeline
        bind_group_layouts: &[Some(particle_layout), Some(camera_bind_group_layout)],
        immediate_size: 0,
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Particle Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("particle.wgsl").into()),
    };
    // translucent sprites test against depth but do not write it
    mk_render_pipeline(
        device,
        &layout,
        config.format,
        Some(wgpu::BlendState::ALPHA_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        false,
        &[position_layout()],
        shader,
    )
}
