use std::fmt;

use crate::map::{GeoBounds, MapView, unit_to_lnglat};

/// Slippy-map tile address.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    #[inline]
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tiles per axis at this zoom.
    #[inline]
    pub fn span(&self) -> u32 {
        1u32 << self.z.min(31)
    }

    pub fn is_valid(&self) -> bool {
        self.z <= 30 && self.x < self.span() && self.y < self.span()
    }

    /// Geographic extent of the tile.
    pub fn bounds(&self) -> GeoBounds {
        let n = f64::from(self.span());
        let nw = unit_to_lnglat([f64::from(self.x) / n, f64::from(self.y) / n]);
        let se = unit_to_lnglat([f64::from(self.x + 1) / n, f64::from(self.y + 1) / n]);
        GeoBounds {
            west: nw[0],
            south: se[1],
            east: se[0],
            north: nw[1],
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tile pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TileConfig {
    /// Tile edge in logical pixels.
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Transformed tiles kept across frames.
    pub cache_capacity: usize,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            min_zoom: 0,
            max_zoom: 19,
            cache_capacity: 128,
        }
    }
}

/// Zoom level used to cover `view`.
///
/// Reversed zoom bounds are reordered rather than rejected.
pub fn tile_zoom(view: &MapView, config: &TileConfig) -> u8 {
    let z = (view.world_size() / f64::from(config.tile_size.max(1))).log2().round();
    let z = if z.is_finite() { z } else { 0.0 };
    let hi = config.min_zoom.max(config.max_zoom).min(30);
    let lo = config.min_zoom.min(config.max_zoom).min(hi);
    (z.max(0.0) as u8).clamp(lo, hi)
}

/// Tiles intersecting the viewport, row-major from the north-west corner.
pub fn tiles_for_view(view: &MapView, config: &TileConfig) -> Vec<TileKey> {
    let z = tile_zoom(view, config);
    let n = 1u32 << z;
    let (min, max) = view.unit_extent();

    let to_index = |u: f64| -> u32 {
        let i = (u * f64::from(n)).floor();
        if i.is_nan() { 0 } else { i.clamp(0.0, f64::from(n - 1)) as u32 }
    };

    if max[0] <= 0.0 || max[1] <= 0.0 || min[0] >= 1.0 || min[1] >= 1.0 {
        return Vec::new();
    }

    let (x0, x1) = (to_index(min[0]), to_index(max[0]));
    let (y0, y1) = (to_index(min[1]), to_index(max[1]));

    let mut keys = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
    for y in y0..=y1 {
        for x in x0..=x1 {
            keys.push(TileKey::new(z, x, y));
        }
    }
    keys
}

/// URL pattern with `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate(String);

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn expand(&self, key: TileKey) -> String {
        self.0
            .replace("{z}", &key.z.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TileUrlTemplate {
    fn default() -> Self {
        Self::new("https://tile.openstreetmap.org/{z}/{x}/{y}.png")
    }
}
