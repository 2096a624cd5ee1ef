//! wgpu backend for layer draw calls.
//!
//! Every layer program draws the same unit quad (corners in `[-1, 1]`) once
//! per record; per-record data arrives as one instance buffer per attribute.
//! Shaders emit straight alpha.

mod common;
mod ctx;
mod layer_renderer;

pub use ctx::{RenderCtx, RenderTarget};
pub use layer_renderer::{BITMAP_TEXTURE_FORMAT, FrameSink, LayerRenderer, check_uniform_block};
