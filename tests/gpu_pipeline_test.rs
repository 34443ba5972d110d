#[cfg(feature = "integration-tests")]
use room_scene::{
    SceneDefinition,
    config::ParticleConfig,
    context::CameraBinding,
    data_structures::{particles::ParticlePreset, texture::Texture},
    pipelines::{basic, light::LightResources, particles},
    render::ScenePainter,
};

#[cfg(feature = "integration-tests")]
use crate::common::test_utils::{MemorySource, load_all, placement, scene, triangle_glb};

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
    futures::executor::block_on(async {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .expect("no adapter");
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .expect("no device")
    })
}

#[cfg(feature = "integration-tests")]
fn config() -> wgpu::SurfaceConfiguration {
    wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        width: 64,
        height: 64,
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn shaders_match_their_layouts() {
    let (device, queue) = device();
    let config = config();
    let camera = CameraBinding::new(&device);
    let lights = LightResources::new(&device);
    let material_layout = basic::material_layout(&device);
    let particle_layout = particles::particle_layout(&device);

    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    basic::mk_basic_pipeline(
        &device,
        &config,
        &material_layout,
        &camera.bind_group_layout,
        &lights.bind_group_layout,
    );
    particles::mk_particle_pipeline(&device, &config, &camera.bind_group_layout, &particle_layout);
    let white = Texture::white(&device, &queue);
    assert_eq!(white.size, [1, 1]);
    let error = futures::executor::block_on(error_scope.pop());
    assert!(error.is_none(), "{:?}", error);
}

#[test]
#[cfg(feature = "integration-tests")]
fn models_and_particles_draw_in_one_pass() {
    let (device, queue) = device();
    let config = config();
    let mut camera = CameraBinding::new(&device);

    let mut definition = SceneDefinition {
        placements: vec![placement("window.glb", [0.0, 0.0, 0.0], Some("window"))],
        ..Default::default()
    };
    definition.particles = vec![ParticleConfig {
        name: "steam".into(),
        preset: ParticlePreset::Steam,
        anchor: Some("window".into()),
        origin: None,
    }];
    let mut scene = scene(definition);
    let ids = load_all(&mut scene, MemorySource::new().with("window.glb", triangle_glb("frame", false)));
    assert!(ids[0].is_some());

    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let mut painter = ScenePainter::new(&device, &queue, &config, &camera.bind_group_layout);
    camera.update(&queue, &scene.rig.camera, &scene.rig.projection);
    painter.prepare(&device, &queue, &mut scene);

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let depth = Texture::create_depth_texture(&device, [config.width, config.height], "depth_texture");
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
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
        painter.paint(&mut pass, &camera.bind_group);
    }
    queue.submit(std::iter::once(encoder.finish()));
    let error = futures::executor::block_on(error_scope.pop());
    assert!(error.is_none(), "{:?}", error);
}
