#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, sync::Once};

use room_scene::{
    DrawTarget, FrameDriver, SceneContext, SceneDefinition,
    config::PlacementRecord,
    resources::{AssetLoader, AssetSource, BoxError, BoxFuture, LoadOutcome},
};

thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if record.target().starts_with("room_scene") {
            RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
        }
    }

    fn flush(&self) {}
}

static INIT: Once = Once::new();

/// Installs the capturing logger and clears this thread's records.
pub fn capture_logs() {
    INIT.call_once(|| {
        log::set_boxed_logger(Box::new(CaptureLogger)).expect("logger already set");
        log::set_max_level(log::LevelFilter::Info);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

/// Messages logged on this thread at `level` since [`capture_logs`].
pub fn logged(level: log::Level) -> Vec<String> {
    RECORDS.with(|r| {
        r.borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    })
}

/// Serves bytes from memory; anything else is a 404.
#[derive(Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> BoxFuture<Result<Vec<u8>, BoxError>> {
        let result = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| BoxError::from(format!("404 for {}", url)));
        Box::pin(async move { result })
    }
}

/// A binary glTF holding one triangle in the XY plane facing +Z, spanning
/// `-1..=1` on both axes. With `clip` the node also gets a one second
/// animation that lifts it by two units.
pub fn triangle_glb(node_name: &str, clip: bool) -> Vec<u8> {
    let mut bin: Vec<u8> = Vec::new();
    let positions: [[f32; 3]; 3] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]];
    for p in positions.iter().flatten() {
        bin.extend_from_slice(&p.to_le_bytes());
    }
    let times: [f32; 2] = [0.0, 1.0];
    for t in times {
        bin.extend_from_slice(&t.to_le_bytes());
    }
    let lifts: [[f32; 3]; 2] = [[0.0, 0.0, 0.0], [0.0, 2.0, 0.0]];
    for p in lifts.iter().flatten() {
        bin.extend_from_slice(&p.to_le_bytes());
    }

    let animations = if clip {
        r#","animations":[{"name":"open","channels":[{"sampler":0,"target":{"node":0,"path":"translation"}}],"samplers":[{"input":1,"output":2,"interpolation":"LINEAR"}]}]"#
    } else {
        ""
    };
    let json = format!(
        concat!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],"#,
            r#""nodes":[{{"name":"{name}","mesh":0}}],"#,
            r#""meshes":[{{"name":"triangle","primitives":[{{"attributes":{{"POSITION":0}}}}]}}],"#,
            r#""buffers":[{{"byteLength":{len}}}],"#,
            r#""bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},{{"buffer":0,"byteOffset":36,"byteLength":8}},{{"buffer":0,"byteOffset":44,"byteLength":24}}],"#,
            r#""accessors":["#,
            r#"{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[-1.0,-1.0,0.0],"max":[1.0,1.0,0.0]}},"#,
            r#"{{"bufferView":1,"componentType":5126,"count":2,"type":"SCALAR","min":[0.0],"max":[1.0]}},"#,
            r#"{{"bufferView":2,"componentType":5126,"count":2,"type":"VEC3","min":[0.0,0.0,0.0],"max":[0.0,2.0,0.0]}}"#,
            r#"]{animations}}}"#
        ),
        name = node_name,
        len = bin.len(),
        animations = animations,
    );

    let mut json = json.into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

/// Resolves every placement of `scene` against `source` and inserts the
/// outcomes in completion order, the way the event loop does.
pub fn load_all(scene: &mut SceneContext, source: MemorySource) -> Vec<Option<room_scene::data_structures::scene_registry::MemberId>> {
    let loader = AssetLoader::new(std::sync::Arc::new(source));
    let futures = loader.placements(&scene.definition.placements);
    let outcomes: Vec<LoadOutcome> = futures::executor::block_on(futures::future::join_all(futures));
    outcomes
        .into_iter()
        .map(|outcome| scene.insert_outcome(outcome))
        .collect()
}

pub fn placement(asset: &str, position: [f32; 3], name: Option<&str>) -> PlacementRecord {
    let mut record = PlacementRecord::new(asset, position, [1.0; 3]);
    record.name = name.map(str::to_string);
    record
}

pub fn scene(definition: SceneDefinition) -> SceneContext {
    use rand::SeedableRng;
    SceneContext::with_rng(definition, 800, 600, rand::rngs::StdRng::seed_from_u64(7))
}

/// Counts draws and remembers the frame they happened in.
#[derive(Debug, Default)]
pub struct Recorder {
    pub draws: usize,
}

impl DrawTarget for Recorder {
    fn draw(&mut self, _scene: &mut SceneContext) -> anyhow::Result<()> {
        self.draws += 1;
        Ok(())
    }
}

/// Runs `n` frames of 16ms each.
pub fn run_frames(driver: &mut FrameDriver, scene: &mut SceneContext, target: &mut dyn DrawTarget, n: usize) {
    for _ in 0..n {
        driver
            .frame(scene, target, std::time::Duration::from_millis(16))
            .expect("frame failed");
    }
}
