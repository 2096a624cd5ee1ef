use crate::attribute::AttributeDescriptor;
use crate::error::AttributeShapeError;
use crate::layer::Effect;
use crate::shader::{Section, Stage};
use crate::uniform::UniformKind;

pub const SHAPE_SQUARE: i32 = 0;
pub const SHAPE_DIAMOND: i32 = 1;
pub const SHAPE_CROSS: i32 = 2;

/// `fade_distance` when the prop is absent: no fade inside the unit circle.
pub const DEFAULT_FADE_DISTANCE: [f32; 2] = [1.0, 1.5];

const FS_DECL: &str = "\
const SHAPE_SQUARE: i32 = 0;
const SHAPE_DIAMOND: i32 = 1;
const SHAPE_CROSS: i32 = 2;
const SHAPE_UNKNOWN: i32 = -1;";

const FS_FILTER_COLOR: &str = "\
    {
        let a = abs(input.uv);
        let code = input.v_shape;
        // NaN, infinities and huge codes have no defined i32 conversion.
        let usable = code == code && abs(code) < 1e6;
        let shape = select(SHAPE_UNKNOWN, i32(round(code)), usable);
        let outside_square = shape == SHAPE_SQUARE && (a.x > 0.7 || a.y > 0.7);
        let outside_diamond = shape == SHAPE_DIAMOND && a.x + a.y > 1.0;
        let outside_cross = shape == SHAPE_CROSS && a.x > 0.25 && a.y > 0.25;
        if outside_square || outside_diamond || outside_cross {
            discard;
        }
        let d = length(input.uv);
        let span = max(u.fade_distance.y - u.fade_distance.x, 0.0001);
        color.a = color.a * clamp((u.fade_distance.y - d) / span, 0.0, 1.0);
    }";

/// Fragment fate of one sample under the shape mask.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Coverage {
    Keep,
    Discard,
}

/// CPU mirror of the mask applied by [`shape_mask`].
///
/// `uv` is the position inside the point quad, `[-1, 1]` per axis. Unknown
/// and non-finite codes keep every sample.
pub fn classify(code: f32, uv: [f32; 2]) -> Coverage {
    if !code.is_finite() || code.abs() >= 1e6 {
        return Coverage::Keep;
    }
    let [x, y] = uv.map(f32::abs);
    let outside = match code.round() as i32 {
        SHAPE_SQUARE => x > 0.7 || y > 0.7,
        SHAPE_DIAMOND => x + y > 1.0,
        SHAPE_CROSS => x > 0.25 && y > 0.25,
        _ => false,
    };
    if outside { Coverage::Discard } else { Coverage::Keep }
}

/// Masks scatter points into squares, diamonds or crosses.
///
/// `shape` returns the per-record code ([`SHAPE_SQUARE`], [`SHAPE_DIAMOND`],
/// [`SHAPE_CROSS`]); other values draw the plain circle. The `shape` attribute
/// is recomputed when the `shape` prop changes. The `fade_distance` prop
/// (`[start, end]` in quad units) fades alpha out radially.
pub fn shape_mask<R, F>(shape: F) -> Result<Effect<R>, AttributeShapeError>
where
    F: Fn(&R) -> f32 + Send + Sync + 'static,
{
    let attribute = AttributeDescriptor::new("shape", 1, move |r| shape(r).into())?.with_triggers(["shape"]);

    Ok(Effect::new("shape_mask")
        .attribute(attribute)
        .uniform("fade_distance", UniformKind::Vec2)
        .provider(|ctx, bag| bag.set("fade_distance", ctx.props.array_or("fade_distance", DEFAULT_FADE_DISTANCE)))
        .varying("v_shape", 1)
        .inject(Stage::Vertex, Section::MainEnd, "    out.v_shape = instance.shape;")
        .inject(Stage::Fragment, Section::Declarations, FS_DECL)
        .inject(Stage::Fragment, Section::hook("filter_color"), FS_FILTER_COLOR))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layer::extend;
    use crate::layers::ScatterLayer;
    use crate::props::Props;
    use crate::shader::compile;

    #[derive(Debug, Clone)]
    struct Marker {
        lnglat: [f64; 2],
        shape: f32,
    }

    fn markers() -> Arc<[Marker]> {
        [0.0, 1.0, 2.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &shape)| Marker {
                lnglat: [i as f64 * 10.0, 0.0],
                shape,
            })
            .collect()
    }

    fn sample_grid() -> Vec<[f32; 2]> {
        let steps = 9;
        let mut out = Vec::new();
        for j in 0..steps {
            for i in 0..steps {
                let t = |k: usize| -1.0 + 2.0 * k as f32 / (steps - 1) as f32;
                out.push([t(i), t(j)]);
            }
        }
        out
    }

    fn run() -> Vec<Vec<Coverage>> {
        let effect = shape_mask(|m: &Marker| m.shape).unwrap();
        let layer = extend(
            "markers",
            ScatterLayer::new(|m: &Marker| m.lnglat),
            vec![effect],
            markers(),
            Props::new(),
        )
        .unwrap();

        let codes = layer.attributes().buffer("shape").unwrap().data().to_vec();
        let grid = sample_grid();
        codes
            .iter()
            .map(|&code| grid.iter().map(|&uv| classify(code, uv)).collect())
            .collect()
    }

    // ── classification ────────────────────────────────────────────────────

    #[test]
    fn shapes_cut_the_expected_regions() {
        assert_eq!(classify(0.0, [0.5, -0.6]), Coverage::Keep);
        assert_eq!(classify(0.0, [0.75, 0.0]), Coverage::Discard);
        assert_eq!(classify(1.0, [0.5, 0.4]), Coverage::Keep);
        assert_eq!(classify(1.0, [0.6, -0.6]), Coverage::Discard);
        assert_eq!(classify(2.0, [0.9, 0.1]), Coverage::Keep);
        assert_eq!(classify(2.0, [0.3, 0.3]), Coverage::Discard);
    }

    #[test]
    fn unknown_codes_stay_visible() {
        for code in [7.0, -3.0, 1e9, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(classify(code, [0.95, 0.95]), Coverage::Keep, "code {code}");
        }
    }

    #[test]
    fn classification_is_reproducible() {
        let first = run();
        let second = run();
        assert_eq!(first, second);

        // Records 0 and 3 share a code and therefore a mask.
        assert_eq!(first[0], first[3]);
        assert_ne!(first[0], first[1]);
        assert_ne!(first[1], first[2]);
    }

    // ── shader ────────────────────────────────────────────────────────────

    #[test]
    fn non_finite_codes_skip_the_discard_branches() {
        let effect = shape_mask(|m: &Marker| m.shape).unwrap();
        let layer = extend("markers", ScatterLayer::new(|m: &Marker| m.lnglat), vec![effect], markers(), Props::new())
            .unwrap();

        let (composed, _) = layer.compose_program().unwrap();
        let fs = composed.stage(Stage::Fragment);
        let guard = fs.find("let usable = code == code && abs(code) < 1e6;").unwrap();
        let select = fs.find("select(SHAPE_UNKNOWN, i32(round(code)), usable)").unwrap();
        let first_branch = fs.find("shape == SHAPE_SQUARE").unwrap();
        assert!(guard < select && select < first_branch);
        assert!(!fs.contains("i32(round(input.v_shape))"));
    }

    #[test]
    fn masked_scatter_compiles() {
        let effect = shape_mask(|m: &Marker| m.shape).unwrap();
        let layer = extend(
            "markers",
            ScatterLayer::new(|m: &Marker| m.lnglat),
            vec![effect],
            markers(),
            Props::new().with("fade_distance", [0.5, 1.0]),
        )
        .unwrap();

        let (composed, _) = layer.compose_program().unwrap();
        assert!(composed.source().contains("@location(3) v_shape: f32,"));
        assert!(composed.source().contains("@location(4) shape: f32,"));
        compile("markers", composed).unwrap();

        let bag = layer.uniform_bag(&crate::layer::testing::frame(0));
        assert_eq!(bag.get("fade_distance").map(|v| v.data), Some([0.5, 1.0].into()));
    }
}
