//! winit event loop owning the map window and its GPU surface.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
