//! Built-in base layers.
//!
//! Both templates share the Web-Mercator projection helpers (`project_pixel`,
//! `to_clip`) and expose the hooks effects rely on:
//!
//! | Template | Vertex hooks | Fragment hooks |
//! |----------|--------------|----------------|
//! | `scatter` | `decl`, `filter_size`, `main-end` | `decl`, `filter_color`, `main-end` |
//! | `bitmap` | `decl`, `main-end` | `decl`, `filter_color`, `main-end` |
//!
//! `filter_size` mutates `size` (radius in logical pixels); `filter_color`
//! mutates `color` (straight-alpha RGBA, 0..1).

mod bitmap;
mod scatter;

pub use bitmap::BitmapLayer;
pub use scatter::{DEFAULT_FILL_COLOR, DEFAULT_RADIUS, ScatterLayer};

const PROJECTION: &str = include_str!("shaders/project.wgsl");
const INCLUDE_PROJECTION: &str = "//#include project";

/// Splices the shared projection helpers into a vertex stage.
fn with_projection(vertex: &str) -> String {
    vertex.replace(INCLUDE_PROJECTION, PROJECTION.trim_end())
}
