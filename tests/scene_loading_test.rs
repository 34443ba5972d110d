use room_scene::{
    SceneDefinition,
    config::{BobberConfig, DoorConfig, ParticleConfig, PlacementRecord},
    data_structures::{mixer::MixerStep, particles::ParticlePreset, scene_registry::SceneMember},
    resources::{AssetLoader, gltf_model::decode_model},
};

use crate::common::test_utils::{
    MemorySource, capture_logs, load_all, logged, placement, scene, triangle_glb,
};

mod common;

fn room(placements: Vec<PlacementRecord>) -> SceneDefinition {
    SceneDefinition {
        placements,
        ..Default::default()
    }
}

#[test]
fn glb_decodes_nodes_meshes_and_clips() {
    let bytes = triangle_glb("garage", true);
    let model = futures::executor::block_on(decode_model(&MemorySource::new(), "door.glb", &bytes)).unwrap();
    assert_eq!(model.nodes.len(), 1);
    assert_eq!(model.roots, vec![0]);
    assert_eq!(model.node_by_name("garage"), Some(0));
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
    assert_eq!(model.animations.len(), 1);
    assert_eq!(model.animations[0].name, "open");
    assert!((model.animations[0].duration - 1.0).abs() < 1e-6);
}

#[test]
fn placement_keeps_position_scale_and_rotation() {
    let mut record = PlacementRecord::new("props/shoe.glb", [-1.9, 0.009, -0.5], [0.02; 3]);
    record.rotation_y = Some(std::f32::consts::FRAC_PI_2);
    let mut unrotated = PlacementRecord::new("props/ps5.glb", [-1.0, 0.03, -2.0], [0.3; 3]);
    unrotated.rotation_y = Some(0.0);

    let mut scene = scene(room(vec![record, unrotated]));
    let source = MemorySource::new()
        .with("props/shoe.glb", triangle_glb("shoe", false))
        .with("props/ps5.glb", triangle_glb("ps5", false));
    let ids = load_all(&mut scene, source);

    let shoe = scene.registry.model(ids[0].unwrap()).unwrap();
    assert_eq!(shoe.transform.position, cgmath::Vector3::new(-1.9, 0.009, -0.5));
    assert_eq!(shoe.transform.scale, cgmath::Vector3::new(0.02, 0.02, 0.02));
    assert_eq!(shoe.transform.rotation, [0.0, std::f32::consts::FRAC_PI_2, 0.0]);

    let ps5 = scene.registry.model(ids[1].unwrap()).unwrap();
    assert_eq!(ps5.transform.rotation, [0.0; 3]);
    assert_eq!(scene.registry.loaded_count(), 2);
}

#[test]
fn failed_placement_logs_once_and_adds_nothing() {
    capture_logs();
    let mut scene = scene(room(vec![
        PlacementRecord::new("props/ok.glb", [0.0; 3], [1.0; 3]),
        PlacementRecord::new("props/missing.glb", [0.0; 3], [1.0; 3]),
    ]));
    let before = scene.registry.len();
    let source = MemorySource::new().with("props/ok.glb", triangle_glb("ok", false));
    let ids = load_all(&mut scene, source);

    assert!(ids[0].is_some());
    assert!(ids[1].is_none());
    assert_eq!(scene.registry.len(), before + 1);
    let errors = logged(log::Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("props/missing.glb"));
}

#[test]
fn undecodable_bytes_are_a_failed_placement() {
    capture_logs();
    let mut scene = scene(room(vec![PlacementRecord::new("props/bad.glb", [0.0; 3], [1.0; 3])]));
    let source = MemorySource::new().with("props/bad.glb", b"not a model".to_vec());
    let ids = load_all(&mut scene, source);
    assert_eq!(ids, vec![None]);
    assert_eq!(scene.registry.loaded_count(), 0);
    assert_eq!(logged(log::Level::Error).len(), 1);
}

#[test]
fn member_count_is_fixed_plus_successful_loads() {
    let definition = SceneDefinition::builtin().unwrap();
    let fixed = definition.fixed_member_count();
    let total = definition.placements.len();
    let failing = definition.placements[1].asset.clone();

    // every url resolves
    let mut all = MemorySource::new();
    for record in &definition.placements {
        all = all.with(&record.asset, triangle_glb("node", false));
    }
    let mut full = scene(definition.clone());
    load_all(&mut full, all);
    // the window placement anchors one steam effect
    assert_eq!(full.registry.len(), fixed + total + 1);

    // one url fails
    let mut partial_source = MemorySource::new();
    for record in definition.placements.iter().filter(|r| r.asset != failing) {
        partial_source = partial_source.with(&record.asset, triangle_glb("node", false));
    }
    let failures = definition
        .placements
        .iter()
        .filter(|r| r.asset == failing)
        .count();
    let mut partial = scene(definition);
    load_all(&mut partial, partial_source);
    assert_eq!(partial.registry.len(), fixed + total - failures + 1);
}

#[test]
fn loader_futures_are_independent() {
    let records = vec![
        PlacementRecord::new("a.glb", [0.0; 3], [1.0; 3]),
        PlacementRecord::new("b.glb", [1.0; 3], [1.0; 3]),
    ];
    let loader = AssetLoader::new(std::sync::Arc::new(
        MemorySource::new().with("b.glb", triangle_glb("b", false)),
    ));
    let mut futures = loader.placements(&records);
    // the second resolves without polling the first
    let second = futures::executor::block_on(futures.remove(1));
    assert_eq!(second.index, 1);
    assert!(second.result.is_ok());
    let first = futures::executor::block_on(futures.remove(0));
    assert!(first.result.is_err());
}

#[test]
fn roles_bind_when_their_placement_loads() {
    let mut definition = room(vec![
        placement("garage.glb", [-2.44, 0.4, -2.08], Some("door")),
        placement("window.glb", [-2.3, 0.5, 0.03], Some("window")),
        placement("drone.glb", [-1.5, 0.5, -2.0], Some("drone")),
    ]);
    definition.door = Some(DoorConfig {
        name: "door".into(),
        open_key: "1".into(),
        close_key: "2".into(),
        clip: None,
        step: MixerStep::Fixed(0.02),
    });
    definition.particles = vec![ParticleConfig {
        name: "steam".into(),
        preset: ParticlePreset::Steam,
        anchor: Some("window".into()),
        origin: None,
    }];
    definition.bobbers = vec![BobberConfig {
        name: "drone".into(),
        amplitude: 0.4,
        frequency: 0.5,
        spin: 0.02,
    }];

    let mut scene = scene(definition);
    assert!(scene.door.is_none());
    let source = MemorySource::new()
        .with("garage.glb", triangle_glb("panel", true))
        .with("window.glb", triangle_glb("frame", false))
        .with("drone.glb", triangle_glb("rotor", false));
    load_all(&mut scene, source);

    assert!(scene.door.is_some());
    assert_eq!(scene.animators.len(), 1);
    let steam = scene
        .registry
        .iter()
        .find_map(|(_, member)| match member {
            SceneMember::Particles(effect) => Some(effect.origin),
            _ => None,
        })
        .unwrap();
    assert_eq!(steam, [-2.3, 0.5, 0.03]);
}
