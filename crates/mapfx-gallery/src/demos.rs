//! The four gallery scenes.

use std::sync::Arc;

use anyhow::Result;
use mapfx_engine::coords::Viewport;
use mapfx_engine::effects::{contrast, pulse, shape_mask};
use mapfx_engine::layer::{LayerStack, extend};
use mapfx_engine::layers::ScatterLayer;
use mapfx_engine::map::MapView;
use mapfx_engine::props::Props;
use mapfx_engine::tile::{ChannelScale, TileConfig, TileLayer, TilePipeline, TileSource};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Demo {
    ShapedPoints,
    PulsingPoints,
    ContrastTiles,
    TintedTiles,
}

impl Demo {
    pub const ALL: [Demo; 4] = [
        Demo::ShapedPoints,
        Demo::PulsingPoints,
        Demo::ContrastTiles,
        Demo::TintedTiles,
    ];

    /// Number-key slot, 1-based.
    pub fn from_slot(slot: usize) -> Option<Demo> {
        Self::ALL.get(slot.checked_sub(1)?).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Demo::ShapedPoints => "shape-masked points",
            Demo::PulsingPoints => "pulsing points",
            Demo::ContrastTiles => "contrast tiles (GPU)",
            Demo::TintedTiles => "green-tinted tiles (CPU)",
        }
    }

    pub fn view(self) -> MapView {
        let viewport = Viewport::new(1280.0, 720.0);
        match self {
            Demo::ShapedPoints | Demo::PulsingPoints => MapView::new(CITY_CENTER, 15.0, viewport),
            Demo::ContrastTiles | Demo::TintedTiles => MapView::new([0.0, 0.0], 2.0, viewport),
        }
    }

    /// Replaces the stack contents with this demo's layers.
    pub fn populate(self, stack: &mut LayerStack, source: &Arc<dyn TileSource>) -> Result<()> {
        stack.clear();
        match self {
            Demo::ShapedPoints => {
                let layer = extend(
                    "shaped-points",
                    points_base(),
                    vec![shape_mask(|p: &Point| p.shape)?],
                    scatter_points(SCATTER_SEED, 400),
                    Props::new(),
                )?;
                stack.push(layer);
            }
            Demo::PulsingPoints => {
                let layer = extend(
                    "pulsing-points",
                    points_base(),
                    vec![pulse()],
                    scatter_points(SCATTER_SEED, 400),
                    Props::new(),
                )?;
                stack.push(layer);
            }
            Demo::ContrastTiles => {
                let pipeline = TilePipeline::new(TileConfig::default(), Arc::clone(source));
                let props = Props::new().with("brightness", -0.9).with("contrast", 1.5);
                stack.push(
                    TileLayer::new("contrast-tiles", pipeline)
                        .with_effects(vec![contrast()])
                        .with_props(props),
                );
            }
            Demo::TintedTiles => {
                let pipeline = TilePipeline::new(TileConfig::default(), Arc::clone(source))
                    .with_transform(Arc::new(ChannelScale::GREEN_TINT));
                stack.push(TileLayer::new("tinted-tiles", pipeline));
            }
        }
        Ok(())
    }
}

const CITY_CENTER: [f64; 2] = [-86.586, 34.73];
const SCATTER_SEED: u64 = 0x5eed_0f_9a11e47;

#[derive(Debug, Clone, Copy)]
pub struct Point {
    pub lnglat: [f64; 2],
    pub radius: f32,
    pub shape: f32,
}

fn points_base() -> ScatterLayer<Point> {
    ScatterLayer::new(|p: &Point| p.lnglat)
        .radius(|p: &Point| p.radius)
        .fill_color(|_: &Point| [1.0, 100.0 / 255.0, 100.0 / 255.0, 1.0])
}

/// Deterministic points scattered around the city center.
pub fn scatter_points(seed: u64, count: usize) -> Arc<[Point]> {
    let mut rng = SplitMix64(seed);
    (0..count)
        .map(|_| Point {
            lnglat: [
                CITY_CENTER[0] + (rng.unit() - 0.5) * 0.03,
                CITY_CENTER[1] + (rng.unit() - 0.5) * 0.02,
            ],
            radius: 4.0 + 10.0 * rng.unit() as f32,
            shape: (rng.next() % 3) as f32,
        })
        .collect()
}

struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn unit(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }
}
