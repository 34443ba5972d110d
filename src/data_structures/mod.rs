//! Scene data: models, instances, particles and the registry that owns them.
//!
//! - `model` holds decoded meshes, materials and the node hierarchy
//! - `instance` holds placement transforms and per-instance GPU data
//! - `geometry` has rays and bounding boxes for picking
//! - `scene_registry` is the append-only list of scene members
//! - `mixer` plays animation clips on loaded instances
//! - `particles` holds particle buffers and their presets
//! - `texture` wraps GPU textures

pub mod geometry;
pub mod instance;
pub mod mixer;
pub mod model;
pub mod particles;
pub mod scene_registry;
pub mod texture;
