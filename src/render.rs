//! GPU side of the scene.
//!
//! [`ScenePainter`] mirrors the scene registry. Because the registry only ever
//! appends, a high-water mark is enough to know which members still need
//! buffers; everything below it is refreshed in place (instance matrices,
//! changed materials, dirty particle buffers).

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    config::rgb,
    context::Context,
    data_structures::{
        instance::InstanceRaw,
        model::{Material, ModelData},
        particles::ParticleEffect,
        scene_registry::{ModelMember, SceneMember},
        texture::Texture,
    },
    flow::DrawTarget,
    pipelines::{
        basic::{self, MaterialUniform},
        light::LightResources,
        particles::{self, ParticleUniform},
    },
    scene::SceneContext,
};

struct GpuMaterial {
    revision: u32,
    texture: Option<Texture>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    count: u32,
    material: usize,
}

struct GpuModel {
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
    /// One [`InstanceRaw`] per mesh draw, rewritten every frame.
    instances: wgpu::Buffer,
    draws: Vec<(usize, u32)>,
    visible: bool,
}

struct GpuParticles {
    positions: wgpu::Buffer,
    count: u32,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

enum GpuMember {
    Model(GpuModel),
    Particles(GpuParticles),
    /// Lights have no buffers of their own.
    None,
}

/// Shared layouts and fallbacks used when creating member resources.
struct Factory {
    material_layout: wgpu::BindGroupLayout,
    particle_layout: wgpu::BindGroupLayout,
    white: Texture,
}

impl Factory {
    fn material(&self, device: &wgpu::Device, queue: &wgpu::Queue, material: &Material) -> GpuMaterial {
        let texture = material
            .image()
            .map(|img| Texture::from_rgba(device, queue, img, Some(material.name.as_str())));
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[MaterialUniform::new(material)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.material_bind_group(device, texture.as_ref(), &uniform);
        GpuMaterial {
            revision: material.revision,
            texture,
            uniform,
            bind_group,
        }
    }

    fn material_bind_group(&self, device: &wgpu::Device, texture: Option<&Texture>, uniform: &wgpu::Buffer) -> wgpu::BindGroup {
        let texture = texture.unwrap_or(&self.white);
        let sampler = texture.sampler.as_ref().or(self.white.sampler.as_ref());
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ];
        if let Some(sampler) = sampler {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &entries,
            label: Some("material_bind_group"),
        })
    }

    /// Video frames of an unchanged size are written into the existing
    /// texture; anything else gets a new texture and bind group.
    fn refresh_material(&self, device: &wgpu::Device, queue: &wgpu::Queue, gpu: &mut GpuMaterial, material: &Material) {
        if gpu.revision == material.revision {
            return;
        }
        gpu.revision = material.revision;
        queue.write_buffer(&gpu.uniform, 0, bytemuck::cast_slice(&[MaterialUniform::new(material)]));
        let Some(img) = material.image() else {
            return;
        };
        if let Some(texture) = &gpu.texture {
            if texture.size == [img.width(), img.height()] {
                texture.write(queue, img);
                return;
            }
        }
        let texture = Texture::from_rgba(device, queue, img, Some(material.name.as_str()));
        gpu.bind_group = self.material_bind_group(device, Some(&texture), &gpu.uniform);
        gpu.texture = Some(texture);
    }

    fn model(&self, device: &wgpu::Device, queue: &wgpu::Queue, model: &ModelData) -> GpuModel {
        let meshes = model
            .meshes
            .iter()
            .map(|mesh| GpuMesh {
                vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", mesh.name)),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", mesh.name)),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                count: mesh.indices.len() as u32,
                material: mesh.material,
            })
            .collect();
        let materials = model
            .materials
            .iter()
            .map(|material| self.material(device, queue, material))
            .collect();
        let draws = model.mesh_world_matrices(cgmath::SquareMatrix::identity(), &model.rest_pose());
        let instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (draws.len().max(1) * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        GpuModel {
            meshes,
            materials,
            instances,
            draws: Vec::new(),
            visible: true,
        }
    }

    fn particles(&self, device: &wgpu::Device, effect: &ParticleEffect) -> GpuParticles {
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Particle Buffer", effect.name)),
            contents: bytemuck::cast_slice(effect.buffer.as_slice()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ParticleUniform::new(&effect.params, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0])]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.particle_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
            label: Some("particle_bind_group"),
        });
        GpuParticles {
            positions,
            count: effect.buffer.count() as u32,
            uniform,
            bind_group,
        }
    }
}

/// GPU copies of every registry member below the high-water mark.
struct GpuScene {
    members: Vec<GpuMember>,
}

impl GpuScene {
    fn new() -> Self {
        Self { members: Vec::new() }
    }

    fn sync(&mut self, factory: &Factory, device: &wgpu::Device, queue: &wgpu::Queue, scene: &mut SceneContext) {
        let view = scene.rig.camera.calc_matrix();
        let right = [view.x.x, view.y.x, view.z.x];
        let up = [view.x.y, view.y.y, view.z.y];

        for idx in 0..scene.registry.len() {
            let id = crate::data_structures::scene_registry::MemberId(idx);
            let Some(member) = scene.registry.get_mut(id) else {
                continue;
            };
            if idx == self.members.len() {
                let gpu = match &*member {
                    SceneMember::Model(m) => GpuMember::Model(factory.model(device, queue, &m.model)),
                    SceneMember::Particles(effect) => GpuMember::Particles(factory.particles(device, effect)),
                    SceneMember::Light(_) => GpuMember::None,
                };
                log::debug!("uploaded member {}", idx);
                self.members.push(gpu);
            }
            match (&mut self.members[idx], member) {
                (GpuMember::Model(gpu), SceneMember::Model(m)) => Self::sync_model(factory, device, queue, gpu, m),
                (GpuMember::Particles(gpu), SceneMember::Particles(effect)) => {
                    if effect.dirty {
                        queue.write_buffer(&gpu.positions, 0, bytemuck::cast_slice(effect.buffer.as_slice()));
                        effect.dirty = false;
                    }
                    queue.write_buffer(
                        &gpu.uniform,
                        0,
                        bytemuck::cast_slice(&[ParticleUniform::new(&effect.params, right, up)]),
                    );
                }
                _ => {}
            }
        }
    }

    fn sync_model(factory: &Factory, device: &wgpu::Device, queue: &wgpu::Queue, gpu: &mut GpuModel, member: &ModelMember) {
        gpu.visible = member.visible;
        for (gpu_material, material) in gpu.materials.iter_mut().zip(&member.model.materials) {
            factory.refresh_material(device, queue, gpu_material, material);
        }
        let draws = member
            .model
            .mesh_world_matrices(member.world_matrix(), &member.pose);
        let raw: Vec<InstanceRaw> = draws
            .iter()
            .map(|(_, world)| InstanceRaw::from_matrix(*world))
            .collect();
        let capacity = (gpu.instances.size() as usize) / std::mem::size_of::<InstanceRaw>();
        let count = raw.len().min(capacity);
        if count > 0 {
            queue.write_buffer(&gpu.instances, 0, bytemuck::cast_slice(&raw[..count]));
        }
        gpu.draws = draws
            .iter()
            .take(count)
            .enumerate()
            .map(|(slot, (mesh, _))| (*mesh, slot as u32))
            .collect();
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, model_pipeline: &wgpu::RenderPipeline, particle_pipeline: &wgpu::RenderPipeline) {
        pass.set_pipeline(model_pipeline);
        for member in &self.members {
            let GpuMember::Model(model) = member else {
                continue;
            };
            if !model.visible {
                continue;
            }
            pass.set_vertex_buffer(1, model.instances.slice(..));
            for &(mesh_idx, slot) in &model.draws {
                let Some(mesh) = model.meshes.get(mesh_idx) else {
                    continue;
                };
                let Some(material) = model.materials.get(mesh.material) else {
                    continue;
                };
                pass.set_bind_group(0, &material.bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.count, 0, slot..slot + 1);
            }
        }

        pass.set_pipeline(particle_pipeline);
        for member in &self.members {
            if let GpuMember::Particles(p) = member {
                pass.set_bind_group(0, &p.bind_group, &[]);
                pass.set_vertex_buffer(0, p.positions.slice(..));
                pass.draw(0..6, 0..p.count);
            }
        }
    }
}

/// Pipelines, lights and the mirrored scene, independent of where the
/// frame ends up.
pub struct ScenePainter {
    factory: Factory,
    lights: LightResources,
    model_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    gpu: GpuScene,
}

impl ScenePainter {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &wgpu::SurfaceConfiguration,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material_layout = basic::material_layout(device);
        let particle_layout = particles::particle_layout(device);
        let lights = LightResources::new(device);
        let model_pipeline = basic::mk_basic_pipeline(
            device,
            config,
            &material_layout,
            camera_bind_group_layout,
            &lights.bind_group_layout,
        );
        let particle_pipeline =
            particles::mk_particle_pipeline(device, config, camera_bind_group_layout, &particle_layout);
        let white = Texture::white(device, queue);
        Self {
            factory: Factory {
                material_layout,
                particle_layout,
                white,
            },
            lights,
            model_pipeline,
            particle_pipeline,
            gpu: GpuScene::new(),
        }
    }

    /// Uploads new members and refreshes lights, instances, materials and
    /// particle buffers.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &mut SceneContext) {
        self.lights.update(queue, scene.registry.lights());
        self.gpu.sync(&self.factory, device, queue, scene);
    }

    /// Group 1 holds the camera for both pipelines. Group 0 is the
    /// material or the particle uniform.
    pub fn paint(&self, pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        pass.set_bind_group(1, camera_bind_group, &[]);
        pass.set_bind_group(2, &self.lights.bind_group, &[]);
        self.gpu
            .draw(pass, &self.model_pipeline, &self.particle_pipeline);
    }
}

/// The window's renderer: GPU context, the scene painter and the sky colour.
pub struct Renderer {
    ctx: Context,
    painter: ScenePainter,
    clear: wgpu::Color,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, sky: u32) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        let painter = ScenePainter::new(&ctx.device, &ctx.queue, &ctx.config, &ctx.camera.bind_group_layout);
        let [r, g, b] = rgb(sky);
        Ok(Self {
            painter,
            clear: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            ctx,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }
}

impl DrawTarget for Renderer {
    fn draw(&mut self, scene: &mut SceneContext) -> anyhow::Result<()> {
        if !self.ctx.is_surface_configured() {
            return Ok(());
        }
        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                let size = self.ctx.window.inner_size();
                self.ctx.resize(size.width, size.height);
                return Ok(());
            }
            e => return Err(anyhow::anyhow!("surface error: {e:?}")),
        };

        self.ctx
            .camera
            .update(&self.ctx.queue, &scene.rig.camera, &scene.rig.projection);
        self.painter
            .prepare(&self.ctx.device, &self.ctx.queue, scene);

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            self.painter.paint(&mut pass, &self.ctx.camera.bind_group);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
