//! mapfx engine.
//!
//! Composable GPU layers for map rendering: a base layer (points, bitmaps)
//! extended with any number of shader effects, drawn through wgpu, plus a
//! raster tile pipeline with CPU pixel transforms.
//!
//! - [`layer`]: base layers, effects, `extend`, the per-frame layer stack
//! - [`shader`]: WGSL templates, hook injection, naga validation, program cache
//! - [`attribute`] / [`uniform`]: per-record buffers and uniform packing
//! - [`tile`]: tile addressing, fetch/decode/transform pipeline, tile layer
//! - [`render`], [`device`], [`window`]: wgpu backend and the winit runtime

pub mod attribute;
pub mod coords;
pub mod core;
pub mod device;
pub mod effects;
pub mod error;
pub mod layer;
pub mod layers;
pub mod logging;
pub mod map;
pub mod props;
pub mod render;
pub mod shader;
pub mod tile;
pub mod time;
pub mod uniform;
pub mod window;
