use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::attribute::{AttributeDescriptor, AttributeManager, AttributeValue};
use crate::error::AttributeShapeError;
use crate::layer::{BaseLayer, DrawContext};
use crate::shader::{ShaderProgramSpec, ShaderTemplate};
use crate::uniform::{UniformBag, UniformKind, UniformSlot};

use super::with_projection;

static TEMPLATE: LazyLock<Arc<ShaderTemplate>> = LazyLock::new(|| {
    let template = ShaderTemplate::new(
        "scatter",
        with_projection(include_str!("shaders/scatter_vs.wgsl")),
        include_str!("shaders/scatter_fs.wgsl"),
    )
    .expect("scatter template declares each hook once");
    // color, uv, feather
    Arc::new(template.with_base_varyings(3))
});

pub const DEFAULT_RADIUS: f32 = 5.0;
pub const DEFAULT_FILL_COLOR: [f32; 4] = [1.0, 0.55, 0.0, 1.0];

type Getter<R, T> = Arc<dyn Fn(&R) -> T + Send + Sync>;

/// Instanced circles at geographic positions.
///
/// Attributes, in location order:
/// - `position`: `[lng, lat]` in degrees
/// - `radius`: logical pixels before `radius_scale`
/// - `fill_color`: straight-alpha RGBA, 0..1
///
/// Props read per draw: `radius_scale` (1), `radius_min_pixels` (0),
/// `opacity` (1).
pub struct ScatterLayer<R> {
    position: Getter<R, [f64; 2]>,
    radius: Getter<R, f32>,
    fill_color: Getter<R, [f32; 4]>,
    triggers: BTreeMap<String, Vec<String>>,
}

impl<R> ScatterLayer<R> {
    pub fn new<F>(position: F) -> Self
    where
        F: Fn(&R) -> [f64; 2] + Send + Sync + 'static,
    {
        Self {
            position: Arc::new(position),
            radius: Arc::new(|_| DEFAULT_RADIUS),
            fill_color: Arc::new(|_| DEFAULT_FILL_COLOR),
            triggers: BTreeMap::new(),
        }
    }

    pub fn radius<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> f32 + Send + Sync + 'static,
    {
        self.radius = Arc::new(f);
        self
    }

    pub fn fill_color<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> [f32; 4] + Send + Sync + 'static,
    {
        self.fill_color = Arc::new(f);
        self
    }

    /// Prop keys that force `attribute` (`position`, `radius`, `fill_color`)
    /// to be recomputed.
    pub fn update_triggers<I, S>(mut self, attribute: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers
            .entry(attribute.to_string())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    fn descriptor<F>(&self, name: &str, width: u8, accessor: F) -> Result<AttributeDescriptor<R>, AttributeShapeError>
    where
        F: Fn(&R) -> AttributeValue + Send + Sync + 'static,
    {
        let descriptor = AttributeDescriptor::new(name, width, accessor)?;
        Ok(match self.triggers.get(name) {
            Some(keys) => descriptor.with_triggers(keys.iter().cloned()),
            None => descriptor,
        })
    }
}

impl<R: 'static> BaseLayer<R> for ScatterLayer<R> {
    fn kind(&self) -> &'static str {
        "scatter"
    }

    fn shader(&self) -> ShaderProgramSpec {
        ShaderProgramSpec::new(Arc::clone(&TEMPLATE))
    }

    fn initialize_attributes(&self, attributes: &mut AttributeManager<R>) -> Result<(), AttributeShapeError> {
        let position = Arc::clone(&self.position);
        attributes.register(self.descriptor("position", 2, move |r| position(r).into())?)?;

        let radius = Arc::clone(&self.radius);
        attributes.register(self.descriptor("radius", 1, move |r| radius(r).into())?)?;

        let fill_color = Arc::clone(&self.fill_color);
        attributes.register(self.descriptor("fill_color", 4, move |r| fill_color(r).into())?)
    }

    fn uniform_slots(&self) -> Vec<UniformSlot> {
        vec![
            UniformSlot::new("radius_scale", UniformKind::F32),
            UniformSlot::new("radius_min_pixels", UniformKind::F32),
            UniformSlot::new("opacity", UniformKind::F32),
        ]
    }

    fn draw(&self, ctx: &DrawContext<'_>, uniforms: &mut UniformBag) {
        uniforms.set("radius_scale", ctx.props.f32_or("radius_scale", 1.0));
        uniforms.set("radius_min_pixels", ctx.props.f32_or("radius_min_pixels", 0.0));
        uniforms.set("opacity", ctx.props.f32_or("opacity", 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::extend;
    use crate::props::Props;
    use crate::shader::{Section, Stage, compile};

    #[derive(Debug, Clone)]
    struct Station {
        lnglat: [f64; 2],
        level: f32,
    }

    fn stations() -> Arc<[Station]> {
        Arc::from([
            Station { lnglat: [-122.4, 37.8], level: 1.0 },
            Station { lnglat: [2.35, 48.85], level: 3.0 },
        ])
    }

    fn base() -> ScatterLayer<Station> {
        ScatterLayer::new(|s: &Station| s.lnglat)
            .radius(|s| s.level * 2.0)
            .update_triggers("radius", ["level_scale"])
    }

    #[test]
    fn template_exposes_documented_hooks() {
        let t = &*TEMPLATE;
        for hook in ["decl", "filter_size", "main-end", "uniforms", "instance-attributes", "varyings"] {
            assert!(t.has_section(Stage::Vertex, &Section::from_marker(hook)), "vertex {hook}");
        }
        for hook in ["decl", "filter_color", "main-end"] {
            assert!(t.has_section(Stage::Fragment, &Section::from_marker(hook)), "fragment {hook}");
        }
        assert!(!t.source(Stage::Vertex).contains("//#include"));
    }

    #[test]
    fn plain_scatter_compiles() {
        let layer = extend("stations", base(), Vec::new(), stations(), Props::new()).unwrap();
        let (composed, layout) = layer.compose_program().unwrap();

        let src = composed.source();
        assert!(src.contains("@location(1) position: vec2<f32>,"));
        assert!(src.contains("@location(2) radius: f32,"));
        assert!(src.contains("@location(3) fill_color: vec4<f32>,"));
        assert_eq!(layout.offset("radius_scale"), Some(20));

        let program = compile("stations", composed).unwrap();
        assert!(!program.is_textured());
    }

    #[test]
    fn accessors_fill_attribute_buffers() {
        let layer = extend("stations", base(), Vec::new(), stations(), Props::new()).unwrap();
        let attrs = layer.attributes();
        assert_eq!(attrs.buffer("position").unwrap().data(), &[-122.4, 37.8, 2.35, 48.85]);
        assert_eq!(attrs.buffer("radius").unwrap().data(), &[2.0, 6.0]);
        assert_eq!(attrs.buffer("fill_color").unwrap().data()[..4], DEFAULT_FILL_COLOR);
    }

    #[test]
    fn update_triggers_reach_the_descriptor() {
        let mut layer = extend("stations", base(), Vec::new(), stations(), Props::new()).unwrap();
        let recomputed = layer.set_props(Props::new().with("level_scale", 2.0)).unwrap();
        assert_eq!(recomputed, ["radius"]);
    }

    #[test]
    fn draw_hook_writes_prop_defaults() {
        let layer = extend("stations", base(), Vec::new(), stations(), Props::new().with("opacity", 0.5)).unwrap();
        let bag = layer.uniform_bag(&crate::layer::testing::frame(0));
        assert_eq!(bag.get("opacity").map(|v| v.data), Some(0.5.into()));
        assert_eq!(bag.get("radius_scale").map(|v| v.data), Some(1.0.into()));
    }
}
