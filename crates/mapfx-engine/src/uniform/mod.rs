//! Per-draw uniforms.
//!
//! Layers declare [`UniformSlot`]s; the [`UniformLayout`] places them in the
//! `LayerUniforms` block with WGSL uniform alignment. Before every draw the
//! layer fills a fresh [`UniformBag`] and the [`UniformBinder`] packs it into a
//! [`UniformBlock`]. There are no delta updates: each block is complete.

mod layout;
mod value;

pub use layout::{UniformBinder, UniformBlock, UniformLayout, UniformSlot};
pub use value::{UniformBag, UniformData, UniformKind, UniformValue, Volatility};
