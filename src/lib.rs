//! room-scene
//!
//! A data-driven interactive 3D room for native windows and the browser. A
//! TOML scene file lists the models to load, the primitives built in code and
//! the behaviour bound to named placements; the crate loads everything
//! concurrently, inserts models as they arrive and drives a fixed per-frame
//! update before rendering with wgpu.
//!
//! High-level modules
//! - `config`: the scene definition file
//! - `scene`: the scene context that owns every member and behaviour
//! - `flow`: window event loop and the per-frame driver
//! - `camera`: camera, projection, orbit controls and picking rays
//! - `pick`: hover and click dispatch over interactive targets
//! - `vehicle`: keyboard driving of the active vehicle
//! - `animators`: bobbing and colour cycling
//! - `video`: video frames streamed onto a screen material
//! - `ui`: labels, notifications and the web page overlay
//! - `data_structures`: models, instances, particles, mixers and the registry
//! - `resources`: asset fetching and glTF decoding
//! - `context`, `pipelines`, `render`: GPU setup and drawing
//!

pub mod animators;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod ui;
pub mod vehicle;
pub mod video;

pub use config::SceneDefinition;
pub use flow::{DrawTarget, FrameDriver, run};
pub use scene::SceneContext;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use winit::event::{TouchPhase, WindowEvent};
