use crate::layer::Effect;
use crate::shader::{Section, Stage};
use crate::uniform::UniformKind;

const FS_FILTER_COLOR: &str = "\
    {
        let gray = (color.r + color.g + color.b) / 3.0 + u.brightness;
        let new_gray = (gray - 0.5) * u.contrast + 0.5;
        color = vec4<f32>(color.rgb * select(new_gray / gray, new_gray, gray == 0.0), color.a);
    }";

/// Brightness / contrast on the GPU, same formula as
/// [`ContrastTransform`](crate::tile::ContrastTransform) on normalized channels.
///
/// Props: `brightness` (0), `contrast` (1). Works on any base with a
/// `filter_color` hook.
pub fn contrast<R>() -> Effect<R> {
    Effect::new("contrast")
        .uniform("brightness", UniformKind::F32)
        .uniform("contrast", UniformKind::F32)
        .provider(|ctx, bag| {
            bag.set("brightness", ctx.props.f32_or("brightness", 0.0));
            bag.set("contrast", ctx.props.f32_or("contrast", 1.0));
        })
        .inject(Stage::Fragment, Section::hook("filter_color"), FS_FILTER_COLOR)
}
