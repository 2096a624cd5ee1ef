use crate::attribute::AttributeManager;
use crate::error::AttributeShapeError;
use crate::shader::ShaderProgramSpec;
use crate::uniform::{UniformBag, UniformSlot};

use super::{DrawContext, TextureSource};

/// A fixed rendering pipeline that effects can extend.
///
/// Contract of the template returned by `shader()`:
/// - the vertex stage declares `LayerUniforms` (hook `uniforms`) bound as `u`,
///   `InstanceInput` (hook `instance-attributes`) and `VertexOutput`
///   (hook `varyings`)
/// - `@location(0)` of the vertex input is the unit quad corner
/// - textured templates sample binding 1 with the sampler at binding 2
///
/// View uniforms (`viewport`, `center`, `world_size`) are declared and written
/// by the layer machinery; `uniform_slots` lists only the base's own.
pub trait BaseLayer<R>: Send {
    /// Short name used in logs (`scatter`, `bitmap`).
    fn kind(&self) -> &'static str;

    /// Template plus any fragments the base itself contributes.
    fn shader(&self) -> ShaderProgramSpec;

    /// Registers the base attributes. Runs before any effect attribute.
    fn initialize_attributes(&self, attributes: &mut AttributeManager<R>) -> Result<(), AttributeShapeError>;

    fn uniform_slots(&self) -> Vec<UniformSlot>;

    /// Per-draw hook: writes the base's uniform values.
    fn draw(&self, ctx: &DrawContext<'_>, uniforms: &mut UniformBag);

    /// Bitmap sampled by textured templates.
    fn texture(&self) -> Option<&TextureSource> {
        None
    }
}
