use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::attribute::{AttributeDescriptor, wgsl_float_type};
use crate::shader::{Section, ShaderInjections, Stage};
use crate::uniform::{UniformBag, UniformKind, UniformSlot};

use super::UniformContext;

/// Writes an effect's uniform values for one draw.
pub type UniformProvider = Arc<dyn Fn(&UniformContext<'_>, &mut UniformBag) + Send + Sync>;

/// Extra `VertexOutput` member passed from the vertex to the fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub name: String,
    pub width: u8,
}

/// A reusable layer extension.
///
/// Everything an effect adds is declared here; [`extend`](super::extend)
/// applies it after the base and after every effect listed before it.
pub struct Effect<R> {
    name: String,
    injections: ShaderInjections,
    attributes: Vec<AttributeDescriptor<R>>,
    uniforms: Vec<UniformSlot>,
    providers: Vec<UniformProvider>,
    varyings: Vec<Varying>,
}

impl<R> Effect<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            injections: ShaderInjections::new(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
            providers: Vec::new(),
            varyings: Vec::new(),
        }
    }

    pub fn inject(mut self, stage: Stage, section: Section, source: impl Into<String>) -> Self {
        self.injections.push(stage, section, source);
        self
    }

    pub fn attribute(mut self, descriptor: AttributeDescriptor<R>) -> Self {
        self.attributes.push(descriptor);
        self
    }

    pub fn uniform(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        self.uniforms.push(UniformSlot::new(name, kind));
        self
    }

    pub fn provider<F>(mut self, f: F) -> Self
    where
        F: Fn(&UniformContext<'_>, &mut UniformBag) + Send + Sync + 'static,
    {
        self.providers.push(Arc::new(f));
        self
    }

    /// Declares a varying; widths outside 1..=4 are clamped.
    pub fn varying(mut self, name: impl Into<String>, width: u8) -> Self {
        self.varyings.push(Varying {
            name: name.into(),
            width: width.clamp(1, 4),
        });
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn injections(&self) -> &ShaderInjections {
        &self.injections
    }

    #[inline]
    pub fn attributes(&self) -> &[AttributeDescriptor<R>] {
        &self.attributes
    }

    #[inline]
    pub fn uniforms(&self) -> &[UniformSlot] {
        &self.uniforms
    }

    #[inline]
    pub fn varyings(&self) -> &[Varying] {
        &self.varyings
    }

    /// Runs the providers in registration order.
    pub fn provide(&self, ctx: &UniformContext<'_>, bag: &mut UniformBag) {
        for p in &self.providers {
            p(ctx, bag);
        }
    }
}

impl<R> Clone for Effect<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            injections: self.injections.clone(),
            attributes: self.attributes.clone(),
            uniforms: self.uniforms.clone(),
            providers: self.providers.clone(),
            varyings: self.varyings.clone(),
        }
    }
}

impl<R> fmt::Debug for Effect<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name)
            .field("injections", &self.injections.len())
            .field("attributes", &self.attributes)
            .field("uniforms", &self.uniforms)
            .field("providers", &self.providers.len())
            .field("varyings", &self.varyings)
            .finish()
    }
}

/// `VertexOutput` members for `varyings`, locations starting at `first_location`.
pub(crate) fn varying_members<'a>(varyings: impl Iterator<Item = &'a Varying>, first_location: u32) -> String {
    let mut out = String::new();
    for (i, v) in varyings.enumerate() {
        let _ = writeln!(
            out,
            "    @location({}) {}: {},",
            first_location + i as u32,
            v.name,
            wgsl_float_type(v.width)
        );
    }
    out
}
