use std::any::Any;
use std::sync::Arc;

use crate::attribute::AttributeBuffer;
use crate::error::{TileDecodeError, UniformTypeError};
use crate::shader::{CompiledProgram, ProgramCache};
use crate::uniform::{UniformBag, UniformBlock};

use super::{FrameContext, LayerId, TextureSource};

/// A fully bound draw: program, instance buffers and the uniform block.
pub struct DrawCall<'a> {
    pub layer: &'a LayerId,
    pub program: &'a Arc<CompiledProgram>,
    /// Registration order; buffer `i` feeds `@location(i + 1)`.
    pub attributes: &'a [AttributeBuffer],
    pub instance_count: u32,
    /// The values `block` was packed from.
    pub uniforms: &'a UniformBag,
    pub block: &'a UniformBlock,
    pub texture: Option<&'a TextureSource>,
}

/// Consumer of draw calls, e.g. the wgpu renderer.
pub trait DrawSink {
    fn submit(&mut self, call: DrawCall<'_>);
}

/// What happened during one `render_frame`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameReport {
    pub drawn: usize,
    /// Layers whose uniforms failed to bind; they retry next frame.
    pub skipped: Vec<(LayerId, UniformTypeError)>,
    /// Layers without a usable program.
    pub omitted: Vec<LayerId>,
    pub tile_errors: Vec<TileDecodeError>,
}

/// Object-safe view of a layer held by a [`LayerStack`].
pub trait Layer {
    fn id(&self) -> &LayerId;

    /// Runs before any layer draws. Asynchronous results are consumed here.
    fn begin_frame(&mut self, frame: &FrameContext, report: &mut FrameReport) {
        let _ = (frame, report);
    }

    fn draw(
        &mut self,
        frame: &FrameContext,
        programs: &mut ProgramCache,
        sink: &mut dyn DrawSink,
        report: &mut FrameReport,
    );

    /// Forgets a failed program so the next frame composes it again.
    fn reconfigure(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Ordered layers plus the program cache they share.
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
    programs: ProgramCache,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer, or replaces the layer with the same id in place.
    pub fn push(&mut self, layer: impl Layer + 'static) {
        self.push_boxed(Box::new(layer));
    }

    pub fn push_boxed(&mut self, layer: Box<dyn Layer>) {
        match self.layers.iter_mut().find(|l| l.id() == layer.id()) {
            Some(slot) => {
                log::debug!("replacing layer `{}`", layer.id());
                *slot = layer;
            }
            None => self.layers.push(layer),
        }
    }

    pub fn remove(&mut self, id: &LayerId) -> Option<Box<dyn Layer>> {
        let index = self.layers.iter().position(|l| l.id() == id)?;
        Some(self.layers.remove(index))
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Typed access to a layer, e.g. to update its props.
    pub fn get_mut<T: 'static>(&mut self, id: &LayerId) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|l| l.id() == id)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn ids(&self) -> impl Iterator<Item = &LayerId> {
        self.layers.iter().map(|l| l.id())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[inline]
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// Re-enables every layer dropped for a program failure.
    pub fn reconfigure_all(&mut self) {
        self.programs.clear();
        for l in &mut self.layers {
            l.reconfigure();
        }
    }

    /// One frame tick: `begin_frame` on every layer, then draws in stack order.
    pub fn render_frame(&mut self, frame: &FrameContext, sink: &mut dyn DrawSink) -> FrameReport {
        let mut report = FrameReport::default();

        for layer in &mut self.layers {
            layer.begin_frame(frame, &mut report);
        }
        for layer in &mut self.layers {
            layer.draw(frame, &mut self.programs, sink, &mut report);
        }

        report
    }
}
