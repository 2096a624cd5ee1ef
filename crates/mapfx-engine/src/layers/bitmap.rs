use std::sync::{Arc, LazyLock};

use image::RgbaImage;

use crate::attribute::{AttributeDescriptor, AttributeManager};
use crate::error::AttributeShapeError;
use crate::layer::{BaseLayer, DrawContext, TextureSource};
use crate::map::GeoBounds;
use crate::shader::{ShaderProgramSpec, ShaderTemplate};
use crate::uniform::{UniformBag, UniformKind, UniformSlot};

use super::with_projection;

static TEMPLATE: LazyLock<Arc<ShaderTemplate>> = LazyLock::new(|| {
    let template = ShaderTemplate::new(
        "bitmap",
        with_projection(include_str!("shaders/bitmap_vs.wgsl")),
        include_str!("shaders/bitmap_fs.wgsl"),
    )
    .expect("bitmap template declares each hook once");
    // uv
    Arc::new(template.textured(true).with_base_varyings(1))
});

/// One image stretched over a geographic rectangle.
///
/// The record is the rectangle itself; [`BitmapLayer::records`] wraps it.
/// Props read per draw: `opacity` (1), `desaturate` (0), `tint_color`
/// (`[1, 1, 1]`).
#[derive(Debug, Clone)]
pub struct BitmapLayer {
    texture: TextureSource,
}

impl BitmapLayer {
    pub fn new(image: Arc<RgbaImage>) -> Self {
        Self {
            texture: TextureSource::new(image),
        }
    }

    /// Record array for a bitmap covering `bounds`.
    pub fn records(bounds: GeoBounds) -> Arc<[GeoBounds]> {
        Arc::from([bounds])
    }
}

impl BaseLayer<GeoBounds> for BitmapLayer {
    fn kind(&self) -> &'static str {
        "bitmap"
    }

    fn shader(&self) -> ShaderProgramSpec {
        ShaderProgramSpec::new(Arc::clone(&TEMPLATE))
    }

    fn initialize_attributes(&self, attributes: &mut AttributeManager<GeoBounds>) -> Result<(), AttributeShapeError> {
        attributes.register(AttributeDescriptor::new("bounds", 4, |b: &GeoBounds| b.to_array().into())?)
    }

    fn uniform_slots(&self) -> Vec<UniformSlot> {
        vec![
            UniformSlot::new("opacity", UniformKind::F32),
            UniformSlot::new("desaturate", UniformKind::F32),
            UniformSlot::new("tint_color", UniformKind::Vec3),
        ]
    }

    fn draw(&self, ctx: &DrawContext<'_>, uniforms: &mut UniformBag) {
        uniforms.set("opacity", ctx.props.f32_or("opacity", 1.0));
        uniforms.set("desaturate", ctx.props.f32_or("desaturate", 0.0).clamp(0.0, 1.0));
        uniforms.set("tint_color", ctx.props.array_or("tint_color", [1.0, 1.0, 1.0]));
    }

    fn texture(&self) -> Option<&TextureSource> {
        Some(&self.texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::testing::{RecordingSink, frame};
    use crate::layer::{FrameReport, Layer, extend};
    use crate::props::Props;
    use crate::shader::{ProgramCache, compile};
    use crate::tile::TileKey;

    fn image() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn bitmap_program_is_textured_and_valid() {
        let bounds = TileKey::new(2, 1, 1).bounds();
        let layer = extend("bitmap", BitmapLayer::new(image()), Vec::new(), BitmapLayer::records(bounds), Props::new())
            .unwrap();
        let (composed, layout) = layer.compose_program().unwrap();

        assert!(composed.source().contains("@location(1) bounds: vec4<f32>,"));
        assert_eq!(layout.offset("tint_color"), Some(32));
        assert_eq!(layout.size(), 48);

        let program = compile("bitmap", composed).unwrap();
        assert!(program.is_textured());
        assert_eq!(layer.attributes().buffer("bounds").unwrap().data(), &bounds.to_array());
    }

    #[test]
    fn draw_carries_the_texture() {
        let img = image();
        let mut layer = extend(
            "bitmap",
            BitmapLayer::new(Arc::clone(&img)),
            Vec::new(),
            BitmapLayer::records(TileKey::new(0, 0, 0).bounds()),
            Props::new().with("tint_color", [0.5, 1.0, 0.5]),
        )
        .unwrap();

        let mut programs = ProgramCache::new();
        let mut sink = RecordingSink::default();
        let mut report = FrameReport::default();
        layer.draw(&frame(0), &mut programs, &mut sink, &mut report);

        assert_eq!(report.drawn, 1);
        let draw = &sink.draws[0];
        assert!(draw.textured);
        assert_eq!(draw.instance_count, 1);
        assert_eq!(draw.uniforms.get("tint_color").map(|v| v.data), Some([0.5, 1.0, 0.5].into()));
        assert_eq!(layer.base().texture().map(TextureSource::id), Some(TextureSource::new(img).id()));
    }
}
