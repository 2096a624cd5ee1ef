//! Layer extension.
//!
//! A base layer ([`BaseLayer`]) owns a WGSL template, its own attributes and
//! uniforms. Effects ([`Effect`]) are plain values carrying shader injections,
//! extra attributes, uniform slots and uniform providers. [`extend`] combines a
//! base with any number of effects into one [`ExtendedLayer`]; nothing is
//! subclassed.
//!
//! Per frame, [`LayerStack::render_frame`] walks the layers in order. For each
//! layer it makes sure the program is compiled, builds a fresh [`UniformBag`]
//! (view uniforms, base hook, effect providers), binds it and hands a
//! [`DrawCall`] to the [`DrawSink`].
//!
//! Failure handling:
//! - shader composition or compilation errors drop the layer until
//!   [`Layer::reconfigure`]
//! - uniform binding errors skip the layer for the current frame only

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::map::MapView;
use crate::props::Props;
use crate::time::ClockReading;

mod base;
mod effect;
mod extend;
mod stack;

pub use base::BaseLayer;
pub use effect::{Effect, UniformProvider, Varying};
pub use extend::{ExtendedLayer, GENERATED_ORIGIN, ProgramState, extend};
pub use stack::{DrawCall, DrawSink, FrameReport, Layer, LayerStack};

#[cfg(test)]
pub(crate) use stack::testing;

/// Caller-chosen layer identity. Used in logs, errors and draw calls.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerId(Arc<str>);

impl LayerId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of a child layer, e.g. one sub-layer per tile.
    pub fn child(&self, suffix: impl fmt::Display) -> Self {
        Self(format!("{}/{}", self.0, suffix).into())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Inputs shared by every layer for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameContext {
    pub clock: ClockReading,
    pub view: MapView,
}

/// Argument of the base layer's per-draw hook.
#[derive(Debug, Copy, Clone)]
pub struct DrawContext<'a> {
    pub layer: &'a LayerId,
    pub props: &'a Props,
    pub clock: ClockReading,
    pub view: &'a MapView,
}

/// Argument of effect uniform providers.
#[derive(Debug, Copy, Clone)]
pub struct UniformContext<'a> {
    pub props: &'a Props,
    pub clock: ClockReading,
}

/// Bitmap sampled by textured programs at bindings 1 and 2.
#[derive(Debug, Clone)]
pub struct TextureSource {
    image: Arc<RgbaImage>,
}

impl TextureSource {
    pub fn new(image: Arc<RgbaImage>) -> Self {
        Self { image }
    }

    #[inline]
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    /// Identity of the pixel data; equal for clones of the same image.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.image) as usize
    }
}
