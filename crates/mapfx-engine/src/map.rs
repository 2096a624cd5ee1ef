//! Web-Mercator map view.
//!
//! Geographic positions are `[longitude, latitude]` in degrees. The world is
//! projected into unit space (`[0, 1]²`, origin north-west) and scaled by
//! `tile_size · 2^zoom` logical pixels.

use std::f64::consts::PI;

use crate::coords::Viewport;
use crate::uniform::{UniformBag, UniformKind, UniformSlot};

/// Latitude limit of the square Web-Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Uniforms every base layer receives from the view.
pub const VIEW_UNIFORMS: [(&str, UniformKind); 3] = [
    ("viewport", UniformKind::Vec2),
    ("center", UniformKind::Vec2),
    ("world_size", UniformKind::F32),
];

pub fn view_uniform_slots() -> impl Iterator<Item = UniformSlot> {
    VIEW_UNIFORMS.iter().map(|(n, k)| UniformSlot::new(*n, *k))
}

/// `[lng, lat]` → unit Mercator `[x, y]`, `y` growing southwards.
pub fn lnglat_to_unit(lnglat: [f64; 2]) -> [f64; 2] {
    let lat = lnglat[1].clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lnglat[0] + 180.0) / 360.0;
    let y = (1.0 - (PI / 4.0 + lat / 2.0).tan().ln() / PI) / 2.0;
    [x, y]
}

/// Unit Mercator `[x, y]` → `[lng, lat]`.
pub fn unit_to_lnglat(unit: [f64; 2]) -> [f64; 2] {
    let lng = unit[0] * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * unit[1])).sinh().atan().to_degrees();
    [lng, lat]
}

/// Geographic rectangle in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// `[west, south, east, north]`, the layout bitmap layers consume.
    pub fn to_array(self) -> [f32; 4] {
        [
            self.west as f32,
            self.south as f32,
            self.east as f32,
            self.north as f32,
        ]
    }

    pub fn contains(&self, lnglat: [f64; 2]) -> bool {
        (self.west..=self.east).contains(&lnglat[0]) && (self.south..=self.north).contains(&lnglat[1])
    }
}

/// Camera over the Mercator world.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapView {
    /// `[lng, lat]` of the viewport center.
    pub center: [f64; 2],
    pub zoom: f64,
    pub viewport: Viewport,
    /// Logical pixels per tile at integer zoom.
    pub tile_size: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 1.0,
            viewport: Viewport::new(1280.0, 720.0),
            tile_size: 256.0,
        }
    }
}

impl MapView {
    pub fn new(center: [f64; 2], zoom: f64, viewport: Viewport) -> Self {
        Self {
            center,
            zoom,
            viewport,
            ..Self::default()
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// World width in logical pixels at the current zoom.
    #[inline]
    pub fn world_size(&self) -> f64 {
        self.tile_size * self.zoom.exp2()
    }

    #[inline]
    pub fn center_unit(&self) -> [f64; 2] {
        lnglat_to_unit(self.center)
    }

    /// `[lng, lat]` → logical pixel, origin top-left of the viewport.
    pub fn project(&self, lnglat: [f64; 2]) -> [f64; 2] {
        let u = lnglat_to_unit(lnglat);
        let c = self.center_unit();
        let s = self.world_size();
        [
            (u[0] - c[0]) * s + f64::from(self.viewport.width) / 2.0,
            (u[1] - c[1]) * s + f64::from(self.viewport.height) / 2.0,
        ]
    }

    /// Logical pixel → `[lng, lat]`.
    pub fn unproject(&self, pixel: [f64; 2]) -> [f64; 2] {
        let c = self.center_unit();
        let s = self.world_size();
        unit_to_lnglat([
            c[0] + (pixel[0] - f64::from(self.viewport.width) / 2.0) / s,
            c[1] + (pixel[1] - f64::from(self.viewport.height) / 2.0) / s,
        ])
    }

    /// Unit-space rectangle covered by the viewport: `(min, max)`.
    pub fn unit_extent(&self) -> ([f64; 2], [f64; 2]) {
        let c = self.center_unit();
        let s = self.world_size();
        let hw = f64::from(self.viewport.width) / 2.0 / s;
        let hh = f64::from(self.viewport.height) / 2.0 / s;
        ([c[0] - hw, c[1] - hh], [c[0] + hw, c[1] + hh])
    }

    pub fn visible_bounds(&self) -> GeoBounds {
        let (min, max) = self.unit_extent();
        let nw = unit_to_lnglat([min[0].max(0.0), min[1].max(0.0)]);
        let se = unit_to_lnglat([max[0].min(1.0), max[1].min(1.0)]);
        GeoBounds {
            west: nw[0],
            south: se[1],
            east: se[0],
            north: nw[1],
        }
    }

    /// Writes `viewport`, `center` and `world_size` into `bag`.
    pub fn write_uniforms(&self, bag: &mut UniformBag) {
        let c = self.center_unit();
        bag.set(
            "viewport",
            [self.viewport.width.max(1.0), self.viewport.height.max(1.0)],
        );
        bag.set("center", [c[0] as f32, c[1] as f32]);
        bag.set("world_size", self.world_size() as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn unit_projection_round_trips() {
        for p in [[0.0, 0.0], [-122.4, 37.8], [151.2, -33.9], [179.0, 80.0]] {
            let back = unit_to_lnglat(lnglat_to_unit(p));
            assert!(close(back[0], p[0]) && close(back[1], p[1]), "{p:?} -> {back:?}");
        }
        assert_eq!(lnglat_to_unit([0.0, 0.0]), [0.5, 0.5]);
    }

    #[test]
    fn center_projects_to_viewport_middle() {
        let view = MapView::new([-122.4, 37.8], 12.0, Viewport::new(800.0, 600.0));
        let p = view.project(view.center);
        assert!(close(p[0], 400.0) && close(p[1], 300.0));

        let east = view.project([-122.3, 37.8]);
        assert!(east[0] > 400.0);
        let north = view.project([-122.4, 37.9]);
        assert!(north[1] < 300.0);
    }

    #[test]
    fn visible_bounds_contain_center() {
        let view = MapView::new([2.35, 48.85], 10.0, Viewport::new(1024.0, 768.0));
        let b = view.visible_bounds();
        assert!(b.contains(view.center));
        assert!(b.west < b.east && b.south < b.north);
    }

    #[test]
    fn view_uniforms_match_declared_slots() {
        let mut bag = UniformBag::new();
        MapView::default().write_uniforms(&mut bag);
        for (name, kind) in VIEW_UNIFORMS {
            assert_eq!(bag.get(name).map(|v| v.data.kind()), Some(kind), "{name}");
        }
        assert_eq!(bag.len(), VIEW_UNIFORMS.len());
    }
}
