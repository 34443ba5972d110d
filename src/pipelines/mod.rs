//! Render pipelines: lit instanced models, particle sprites and the scene
//! light uniform.

pub mod basic;
pub mod light;
pub mod particles;
